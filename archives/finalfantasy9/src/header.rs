use byteorder::{
	LE,
	ReadBytesExt
};

use std::io::{
	Read,
	Seek
};

use rgk_core::io_ext::{
	ReadBinExt,
	SeekBinExt
};

#[cfg(feature = "import")]
use crate::import::ArchiveImportError;

/// Size of the marker, count and padding fields preceding the identifiers
pub const PREFIX_SIZE: u64 = 4;

/// Recurring multi-object index found at the start of model, texture, animation and material
/// files, as well as of every nested DataBlock list
#[derive(Clone, Debug, PartialEq)]
pub struct FileHeader {
	pub address: u64,
	pub marker: u8,
	pub num_objs: u8,
	pub ids: Vec<u16>,
	/// Absolute object addresses
	pub offsets: Vec<u64>,
	/// Total size of the file as declared by its trailing field
	pub size: u32,
}

impl FileHeader {
	/// Reads the header starting at `address`
	#[cfg(feature = "import")]
	pub fn read_at<R>(address: u64, buf: &mut R) -> Result<FileHeader, ArchiveImportError>
	where
		R: Read + Seek,
	{
		buf.seek_to(address)?;
		FileHeader::read(buf)
	}

	/// Reads the header at the current position
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<FileHeader, ArchiveImportError>
	where
		R: Read + Seek,
	{
		let address = buf.tell()?;
		let marker = buf.read_u8()?;
		let nobjs = buf.read_u8()?;

		if let Some(found) = buf.read_zero_u16()? {
			return Err(ArchiveImportError::Padding {
				address: address + 2,
				found: found,
			});
		}

		let mut ids = vec![];
		for _ in 0..nobjs {
			ids.push(buf.read_u16::<LE>()?);
		}

		// Identifiers are padded to a 4-byte boundary
		if nobjs % 2 != 0 {
			buf.skip(2)?;
		}

		let mut offsets = vec![];
		for _ in 0..nobjs {
			offsets.push(buf.read_rel_i32()?);
		}

		let size = buf.read_u32::<LE>()?;

		tracing::trace!(address, objects = nobjs, "file header");

		Ok(FileHeader {
			address: address,
			marker: marker,
			num_objs: nobjs,
			ids: ids,
			offsets: offsets,
			size: size,
		})
	}

	/// Iterates over `(identifier, absolute address)` pairs
	pub fn objects(&self) -> impl Iterator<Item = (u16, u64)> + '_ {
		self.ids.iter().copied().zip(self.offsets.iter().copied())
	}
}

#[cfg(all(test, feature = "import"))]
pub(crate) mod tests {
	use byteorder::WriteBytesExt;

	use std::io::Cursor;

	use super::*;

	/// Encodes a header at `base` whose objects live at the given absolute addresses
	pub(crate) fn header_bytes(base: u64, ids: &[u16], targets: &[u64]) -> Vec<u8> {
		let mut out = vec![];
		out.write_u8(crate::DBCHUNK).unwrap();
		out.write_u8(ids.len() as u8).unwrap();
		out.write_u16::<LE>(0).unwrap();

		for id in ids.iter() {
			out.write_u16::<LE>(*id).unwrap();
		}

		if ids.len() % 2 != 0 {
			out.write_u16::<LE>(0).unwrap();
		}

		for target in targets.iter() {
			let field = base + out.len() as u64;
			out.write_i32::<LE>((*target as i64 - field as i64) as i32).unwrap();
		}

		out.write_u32::<LE>(0x100).unwrap();
		out
	}

	#[test]
	fn test_odd_count_alignment() {
		let mut data = vec![0; 16];
		data.extend(header_bytes(16, &[7, 8, 9], &[64, 80, 96]));
		let mut buf = Cursor::new(data);

		let header = FileHeader::read_at(16, &mut buf).unwrap();
		assert_eq!(3, header.num_objs);
		assert_eq!(vec![7, 8, 9], header.ids);
		assert_eq!(vec![64, 80, 96], header.offsets);
		assert_eq!(0x100, header.size);
		assert_eq!(vec![(7, 64), (8, 80), (9, 96)], header.objects().collect::<Vec<_>>());
	}

	#[test]
	fn test_even_count() {
		let mut buf = Cursor::new(header_bytes(0, &[1, 2], &[40, 48]));
		let header = FileHeader::read(&mut buf).unwrap();

		assert_eq!(header.ids.len(), header.offsets.len());
		assert_eq!(header.num_objs as usize, header.ids.len());
		assert!(header.offsets.iter().all(|o| *o > header.address + PREFIX_SIZE));
		// 4 prefix + 4 ids + 8 offsets + 4 size
		assert_eq!(20, buf.tell().unwrap());
	}

	#[test]
	fn test_nonzero_padding() {
		let mut data = header_bytes(0, &[1], &[32]);
		data[3] = 0x01;

		match FileHeader::read(&mut Cursor::new(data)) {
			Err(ArchiveImportError::Padding { address, found }) => {
				assert_eq!(2, address);
				assert_eq!(0x0100, found);
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}
}
