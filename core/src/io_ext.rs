use byteorder::{
	LE,
	ReadBytesExt
};

use std::io::{
	Error,
	ErrorKind,
	Read,
	Result,
	Seek,
	SeekFrom
};

pub trait ReadBinExt: Read {
	/// Reads three little endian signed 16-bit values, usually a fixed-point vector
	#[inline]
	fn read_i16x3_le(&mut self) -> Result<[i16; 3]> {
		Ok([self.read_i16::<LE>()?, self.read_i16::<LE>()?, self.read_i16::<LE>()?])
	}

	/// Reads a little endian 16-bit field that the format requires to be zero, returning the
	/// value found so the caller can report it
	#[inline]
	fn read_zero_u16(&mut self) -> Result<Option<u16>> {
		match self.read_u16::<LE>()? {
			0 => Ok(None),
			n => Ok(Some(n)),
		}
	}
}

impl<R> ReadBinExt for R
where
	R: Read + ?Sized,
{
}

/// Positioned access for formats that address their contents with absolute or self-relative
/// offsets.
pub trait SeekBinExt: Read + Seek {
	/// Returns the absolute position of the cursor
	#[inline]
	fn tell(&mut self) -> Result<u64> {
		self.stream_position()
	}

	/// Moves the cursor to an absolute address
	#[inline]
	fn seek_to(&mut self, address: u64) -> Result<()> {
		self.seek(SeekFrom::Start(address))?;
		Ok(())
	}

	/// Moves the cursor by `count` bytes relative to its current position
	#[inline]
	fn skip(&mut self, count: i64) -> Result<()> {
		self.seek(SeekFrom::Current(count))?;
		Ok(())
	}

	/// Reads a little endian 24-bit byte triplet and resolves it against the address the field
	/// starts at
	#[inline]
	fn read_rel_u24(&mut self) -> Result<u64> {
		let base = self.tell()?;
		Ok(base + self.read_u24::<LE>()? as u64)
	}

	/// Reads a little endian signed 32-bit offset and resolves it against the address the field
	/// starts at
	#[inline]
	fn read_rel_i32(&mut self) -> Result<u64> {
		let base = self.tell()?;
		let offset = self.read_i32::<LE>()? as i64;

		u64::try_from(base as i64 + offset).map_err(|_| Error::new(ErrorKind::InvalidData,
			format!("offset {} at {:#x} points before the start of the stream", offset, base)))
	}
}

impl<R> SeekBinExt for R
where
	R: Read + Seek + ?Sized,
{
}
