pub mod datablock;
pub mod header;
pub mod index;

pub use datablock::{
	BlockId,
	DataBlock,
	DataBlockTree
};

pub use header::FileHeader;

pub use index::{
	ArchiveIndex,
	DirType,
	DirectoryDescriptor
};

pub use rgk_core::SECTOR_SIZE;

/// Leading marker byte of every DataBlock and of the FileHeaders found inside them
pub const DBCHUNK: u8 = 0xDB;

/// File type tags, as stored in directory and DataBlock pointer records
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum FileType {
	Model = 0x02,
	Animation = 0x03,
	TimImage = 0x04,
	Script = 0x05,
	/// Dialog text, one byte per character
	Text = 0x06,
	/// Music sequences
	Sequencer = 0x07,
	Audio = 0x09,
	FieldTiles = 0x0A,
	FieldWalkmesh = 0x0B,
	FieldBattleScene = 0x0C,
	EnemyStats = 0x10,
	ClutAndTPages = 0x12,
	DataBlock = 0x1B,
	Unknown = 0xFF,
}

impl From<u8> for FileType {
	fn from(tag: u8) -> FileType {
		match tag {
			0x02 => FileType::Model,
			0x03 => FileType::Animation,
			0x04 => FileType::TimImage,
			0x05 => FileType::Script,
			0x06 => FileType::Text,
			0x07 => FileType::Sequencer,
			0x09 => FileType::Audio,
			0x0A => FileType::FieldTiles,
			0x0B => FileType::FieldWalkmesh,
			0x0C => FileType::FieldBattleScene,
			0x10 => FileType::EnemyStats,
			0x12 => FileType::ClutAndTPages,
			0x1B => FileType::DataBlock,
			_ => FileType::Unknown,
		}
	}
}

/// Where a file starts: directory records count in sectors, DataBlock records in bytes
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Location {
	Sector(u32),
	Address(u64),
}

impl Location {
	/// Absolute byte address within the disc image
	pub fn address(&self) -> u64 {
		match *self {
			Location::Sector(s) => s as u64 * SECTOR_SIZE,
			Location::Address(a) => a,
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FilePointer {
	pub id: u16,
	pub tag: u8,
	pub location: Location,
	/// DataBlock holding this record; `None` for directory records
	pub parent: Option<BlockId>,
}

impl FilePointer {
	pub fn kind(&self) -> FileType {
		FileType::from(self.tag)
	}

	pub fn address(&self) -> u64 {
		self.location.address()
	}
}

#[cfg(feature = "import")]
pub mod import {
	use std::io;
	use thiserror::Error;

	#[derive(Debug, Error)]
	pub enum ArchiveImportError {
		#[error("Nesting deeper than {max} DataBlocks at {address:#x}")]
		Depth {
			address: u64,
			max: usize,
		},
		#[error("Directory index {index} out of bounds ({count} directories)")]
		DirectoryIndex {
			index: usize,
			count: usize,
		},
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("Not a DataBlock at {address:#x}: expected marker {:#x}, found {found:#x}", crate::DBCHUNK)]
		Marker {
			address: u64,
			found: u8,
		},
		#[error("Nonzero padding at {address:#x}: {found:#x}")]
		Padding {
			address: u64,
			found: u16,
		},
		#[error("Unsupported directory type: {0}")]
		UnsupportedDirectory(u32),
	}
}
