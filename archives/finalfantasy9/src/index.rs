use byteorder::{
	LE,
	ReadBytesExt
};

use std::io::{
	Read,
	Seek
};

use rgk_core::io_ext::SeekBinExt;

use crate::{
	FilePointer,
	Location,
	SECTOR_SIZE
};

#[cfg(feature = "import")]
use crate::import::ArchiveImportError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum DirType {
	Normal = 2,
	Hierarchical,
	EndMarker,
	Unknown = u32::MAX,
}

impl From<u32> for DirType {
	fn from(kind: u32) -> DirType {
		match kind {
			2 => DirType::Normal,
			3 => DirType::Hierarchical,
			4 => DirType::EndMarker,
			_ => DirType::Unknown,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
	pub magic: [u8; 4],
	pub unknown_4: u32,
	pub num_dirs: u32,
	pub unknown_c: u32,
}

impl Header {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<Header, ArchiveImportError>
	where
		R: ReadBytesExt,
	{
		let mut magic = [0; 4];
		buf.read_exact(&mut magic)?;

		Ok(Header {
			magic: magic,
			unknown_4: buf.read_u32::<LE>()?,
			num_dirs: buf.read_u32::<LE>()?,
			unknown_c: buf.read_u32::<LE>()?,
		})
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectoryDescriptor {
	pub kind: u32,
	pub num_files: u32,
	/// Sector holding the directory's file pointer table
	pub start_sector: u32,
	pub first_file_sector: u32,
}

impl DirectoryDescriptor {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<DirectoryDescriptor, ArchiveImportError>
	where
		R: ReadBytesExt,
	{
		Ok(DirectoryDescriptor {
			kind: buf.read_u32::<LE>()?,
			num_files: buf.read_u32::<LE>()?,
			start_sector: buf.read_u32::<LE>()?,
			first_file_sector: buf.read_u32::<LE>()?,
		})
	}

	pub fn dir_type(&self) -> DirType {
		DirType::from(self.kind)
	}

	/// Reads the directory's flat table of 8-byte file pointer records
	#[cfg(feature = "import")]
	pub fn read_pointers<R>(&self, buf: &mut R) -> Result<Vec<FilePointer>, ArchiveImportError>
	where
		R: Read + Seek,
	{
		buf.seek_to(self.start_sector as u64 * SECTOR_SIZE)?;

		let mut pointers = vec![];
		for _ in 0..self.num_files {
			let id = buf.read_u16::<LE>()?;
			// Type tags never exceed one byte; the high byte is always clear
			let tag = buf.read_u16::<LE>()? as u8;
			let sector = buf.read_u32::<LE>()?;

			pointers.push(FilePointer {
				id: id,
				tag: tag,
				location: Location::Sector(sector),
				parent: None,
			});
		}

		tracing::debug!(files = pointers.len(), sector = self.start_sector, "directory pointers read");
		Ok(pointers)
	}
}

/// The disc-level root directory
#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveIndex {
	pub header: Header,
	pub directories: Vec<DirectoryDescriptor>,
}

impl ArchiveIndex {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<ArchiveIndex, ArchiveImportError>
	where
		R: ReadBytesExt,
	{
		let header = Header::read(buf)?;

		let mut dirs = vec![];
		for _ in 0..header.num_dirs {
			dirs.push(DirectoryDescriptor::read(buf)?);
		}

		tracing::debug!(directories = dirs.len(), "archive index read");

		Ok(ArchiveIndex {
			header: header,
			directories: dirs,
		})
	}

	#[cfg(feature = "import")]
	pub fn directory(&self, index: usize) -> Result<&DirectoryDescriptor, ArchiveImportError> {
		self.directories.get(index).ok_or(ArchiveImportError::DirectoryIndex {
			index: index,
			count: self.directories.len(),
		})
	}
}

#[cfg(all(test, feature = "import"))]
mod tests {
	use byteorder::WriteBytesExt;

	use std::io::Cursor;

	use super::*;

	fn index_bytes() -> Vec<u8> {
		let mut out = b"FF9 ".to_vec();
		for v in [1u32, 2, 0] {
			out.write_u32::<LE>(v).unwrap();
		}
		for v in [2u32, 2, 1, 2, 3, 0, 5, 6] {
			out.write_u32::<LE>(v).unwrap();
		}
		out.resize(SECTOR_SIZE as usize, 0);

		// Directory 0's pointer table
		for (id, tag, sector) in [(0u16, 0x1Bu16, 2u32), (1, 0x04, 3)] {
			out.write_u16::<LE>(id).unwrap();
			out.write_u16::<LE>(tag).unwrap();
			out.write_u32::<LE>(sector).unwrap();
		}
		out
	}

	#[test]
	fn test_index() {
		let mut buf = Cursor::new(index_bytes());
		let index = ArchiveIndex::read(&mut buf).unwrap();

		assert_eq!(*b"FF9 ", index.header.magic);
		assert_eq!(2, index.directories.len());
		assert_eq!(DirType::Normal, index.directory(0).unwrap().dir_type());
		assert_eq!(DirType::Hierarchical, index.directory(1).unwrap().dir_type());
		assert!(matches!(index.directory(2), Err(ArchiveImportError::DirectoryIndex { index: 2, count: 2 })));
	}

	#[test]
	fn test_pointers() {
		let mut buf = Cursor::new(index_bytes());
		let index = ArchiveIndex::read(&mut buf).unwrap();
		let pointers = index.directory(0).unwrap().read_pointers(&mut buf).unwrap();

		assert_eq!(2, pointers.len());
		assert_eq!(crate::FileType::DataBlock, pointers[0].kind());
		assert_eq!(2 * SECTOR_SIZE, pointers[0].address());
		assert_eq!(1, pointers[1].id);
		assert_eq!(Location::Sector(3), pointers[1].location);
	}
}
