use byteorder::ReadBytesExt;

use std::io::{
	Read,
	Seek
};

use rgk_core::io_ext::{
	ReadBinExt,
	SeekBinExt
};

use crate::{
	DBCHUNK,
	FilePointer,
	FileType,
	Location,
	header::FileHeader,
	index::{
		DirType,
		DirectoryDescriptor
	}
};

#[cfg(feature = "import")]
use crate::import::ArchiveImportError;

/// Index of a block within its [`DataBlockTree`]
pub type BlockId = usize;

/// Nesting limit guarding against self-referencing blocks
pub const MAX_DEPTH: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub struct DataBlock {
	/// Address of the block's marker byte
	pub address: u64,
	pub num_files: u8,
	pub pointers: Vec<FilePointer>,
	pub children: Vec<BlockId>,
	pub parent: Option<BlockId>,
}

/// Arena holding every DataBlock reachable from a directory's files
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataBlockTree {
	pub blocks: Vec<DataBlock>,
	pub roots: Vec<BlockId>,
}

impl DataBlockTree {
	pub fn new() -> DataBlockTree {
		DataBlockTree::default()
	}

	/// Reads the DataBlock trees of every file in a directory. Files that do not start with a
	/// DataBlock marker are skipped.
	#[cfg(feature = "import")]
	pub fn read_directory<R>(dir: &DirectoryDescriptor, buf: &mut R) -> Result<DataBlockTree, ArchiveImportError>
	where
		R: Read + Seek,
	{
		if dir.dir_type() != DirType::Normal {
			return Err(ArchiveImportError::UnsupportedDirectory(dir.kind));
		}

		let mut tree = DataBlockTree::new();

		for pointer in dir.read_pointers(buf)?.iter() {
			buf.seek_to(pointer.address())?;
			if buf.read_u8()? == DBCHUNK {
				tree.read_root(buf)?;
			}
		}

		tracing::debug!(roots = tree.roots.len(), blocks = tree.blocks.len(), "datablocks read");
		Ok(tree)
	}

	/// Reads a top-level block. The caller must already have consumed and checked its marker.
	#[cfg(feature = "import")]
	pub fn read_root<R>(&mut self, buf: &mut R) -> Result<BlockId, ArchiveImportError>
	where
		R: Read + Seek,
	{
		let id = self.read_block(buf, None, 0)?;
		self.roots.push(id);
		Ok(id)
	}

	#[cfg(feature = "import")]
	fn read_block<R>(&mut self, buf: &mut R, parent: Option<BlockId>, depth: usize)
		-> Result<BlockId, ArchiveImportError>
	where
		R: Read + Seek,
	{
		let address = buf.tell()?.saturating_sub(1);
		let id = self.blocks.len();
		let nfiles = buf.read_u8()?;

		if let Some(found) = buf.read_zero_u16()? {
			return Err(ArchiveImportError::Padding {
				address: address + 2,
				found: found,
			});
		}

		let mut pointers = vec![];
		for i in 0..nfiles {
			let target = buf.read_rel_u24()?;

			pointers.push(FilePointer {
				id: i as u16,
				tag: buf.read_u8()?,
				location: Location::Address(target),
				parent: Some(id),
			});
		}

		let nested: Vec<u64> = pointers.iter()
			.filter(|p| p.kind() == FileType::DataBlock)
			.map(|p| p.address())
			.collect();

		self.blocks.push(DataBlock {
			address: address,
			num_files: nfiles,
			pointers: pointers,
			children: vec![],
			parent: parent,
		});

		for header_addr in nested {
			if depth >= MAX_DEPTH {
				return Err(ArchiveImportError::Depth {
					address: header_addr,
					max: MAX_DEPTH,
				});
			}

			let header = FileHeader::read_at(header_addr, buf)?;

			for offset in header.offsets.iter() {
				buf.seek_to(*offset)?;

				let marker = buf.read_u8()?;
				if marker != DBCHUNK {
					return Err(ArchiveImportError::Marker {
						address: *offset,
						found: marker,
					});
				}

				let child = self.read_block(buf, Some(id), depth + 1)?;
				self.blocks[id].children.push(child);
			}
		}

		Ok(id)
	}

	pub fn block(&self, id: BlockId) -> &DataBlock {
		&self.blocks[id]
	}

	pub fn parent(&self, id: BlockId) -> Option<BlockId> {
		self.blocks.get(id).and_then(|b| b.parent)
	}

	/// Depth-first, pre-order search for files of one type below (and including) `roots`
	pub fn collect_files(&self, roots: &[BlockId], kind: FileType) -> Vec<FilePointer> {
		let mut files = vec![];
		for root in roots.iter() {
			self.collect_into(*root, kind, &mut files);
		}
		files
	}

	fn collect_into(&self, id: BlockId, kind: FileType, files: &mut Vec<FilePointer>) {
		let block = &self.blocks[id];

		files.extend(block.pointers.iter().filter(|p| p.kind() == kind));

		for child in block.children.iter() {
			self.collect_into(*child, kind, files);
		}
	}
}

#[cfg(all(test, feature = "import"))]
mod tests {
	use byteorder::{
		LE,
		WriteBytesExt
	};

	use std::io::Cursor;

	use crate::header::tests::header_bytes;

	use super::*;

	fn block_bytes(base: u64, records: &[(u64, u8)]) -> Vec<u8> {
		let mut out = vec![DBCHUNK, records.len() as u8, 0, 0];
		for (target, tag) in records.iter() {
			let field = base + out.len() as u64;
			out.write_u24::<LE>((*target - field) as u32).unwrap();
			out.write_u8(*tag).unwrap();
		}
		out
	}

	fn place(image: &mut Vec<u8>, at: usize, bytes: &[u8]) {
		if image.len() < at + bytes.len() {
			image.resize(at + bytes.len(), 0);
		}
		image[at..at + bytes.len()].copy_from_slice(bytes);
	}

	/// Root block at 0 holding a model and a nested list; the nested list holds one block with a
	/// texture and a second model.
	fn nested_image() -> Vec<u8> {
		let mut image = vec![];
		place(&mut image, 0x00, &block_bytes(0x00, &[(0x40, 0x02), (0x20, 0x1B)]));
		place(&mut image, 0x20, &header_bytes(0x20, &[0], &[0x30]));
		place(&mut image, 0x30, &block_bytes(0x30, &[(0x50, 0x04), (0x60, 0x02)]));
		image.resize(0x80, 0);
		image
	}

	#[test]
	fn test_tree() {
		let mut buf = Cursor::new(nested_image());
		buf.seek_to(1).unwrap();

		let mut tree = DataBlockTree::new();
		let root = tree.read_root(&mut buf).unwrap();

		assert_eq!(vec![root], tree.roots);
		assert_eq!(2, tree.blocks.len());
		assert_eq!(vec![1], tree.block(root).children);
		assert_eq!(Some(root), tree.parent(1));
		assert_eq!(None, tree.parent(root));
		assert_eq!(0x30, tree.block(1).address);
		assert_eq!(0x40, tree.block(root).pointers[0].address());
	}

	#[test]
	fn test_collect_preorder() {
		let mut buf = Cursor::new(nested_image());
		buf.seek_to(1).unwrap();

		let mut tree = DataBlockTree::new();
		tree.read_root(&mut buf).unwrap();

		let models = tree.collect_files(&tree.roots, FileType::Model);
		assert_eq!(vec![0x40, 0x60], models.iter().map(|p| p.address()).collect::<Vec<_>>());
		assert_eq!(Some(0), models[0].parent);
		assert_eq!(Some(1), models[1].parent);

		let textures = tree.collect_files(&[1], FileType::TimImage);
		assert_eq!(1, textures.len());
		assert_eq!(0x50, textures[0].address());
		assert!(tree.collect_files(&[1], FileType::Animation).is_empty());
	}

	#[test]
	fn test_bad_child_marker() {
		let mut image = nested_image();
		image[0x30] = 0xDA;

		let mut buf = Cursor::new(image);
		buf.seek_to(1).unwrap();

		match DataBlockTree::new().read_root(&mut buf) {
			Err(ArchiveImportError::Marker { address, found }) => {
				assert_eq!(0x30, address);
				assert_eq!(0xDA, found);
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn test_self_reference() {
		// The nested header points back at the block that lists it
		let mut image = vec![];
		place(&mut image, 0x00, &block_bytes(0x00, &[(0x10, 0x1B)]));
		place(&mut image, 0x10, &header_bytes(0x10, &[0], &[0x00]));

		let mut buf = Cursor::new(image);
		buf.seek_to(1).unwrap();

		let mut tree = DataBlockTree::new();
		assert!(matches!(tree.read_root(&mut buf),
			Err(ArchiveImportError::Depth { address: 0x10, max: MAX_DEPTH })));
		assert_eq!(MAX_DEPTH + 1, tree.blocks.len());
	}

	#[test]
	fn test_bad_padding() {
		let mut image = nested_image();
		image[0x32] = 1;

		let mut buf = Cursor::new(image);
		buf.seek_to(1).unwrap();
		assert!(matches!(DataBlockTree::new().read_root(&mut buf),
			Err(ArchiveImportError::Padding { address: 0x32, found: 1 })));
	}

	#[test]
	fn test_unsupported_directory() {
		let dir = DirectoryDescriptor {
			kind: 3,
			num_files: 0,
			start_sector: 0,
			first_file_sector: 0,
		};

		assert!(matches!(DataBlockTree::read_directory(&dir, &mut Cursor::new(vec![])),
			Err(ArchiveImportError::UnsupportedDirectory(3))));
	}
}
