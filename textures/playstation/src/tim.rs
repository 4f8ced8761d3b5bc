use bitflags::bitflags;

use byteorder::{
	LE,
	ReadBytesExt
};

use std::io;
use thiserror::Error;

use rgk_core::texture::{
	Color,
	Texture
};

pub const MAGIC: u8 = 0x10;

bitflags! {
	pub struct Flags: u32 {
		/// Two-bit color format selector, see [`ColorFormat`]
		const MODE = 3;
		const INDEXED = 8;
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ColorFormat {
	Paletted4 = 0,
	Paletted8,
	Direct16,
	Direct24,
}

impl ColorFormat {
	/// Number of pixels covered by `word_width` 16-bit words
	pub fn pixel_width(&self, word_width: usize) -> usize {
		match *self {
			ColorFormat::Paletted4 => word_width * 4,
			ColorFormat::Paletted8 => word_width * 2,
			ColorFormat::Direct16 => word_width,
			ColorFormat::Direct24 => word_width * 2 / 3,
		}
	}
}

#[cfg(feature = "import")]
#[derive(Debug, Error)]
pub enum TIMImportError {
	#[error("No texture contains CLUT position ({x}, {y})")]
	ClutNotFound {
		x: u16,
		y: u16,
	},
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Not a PlayStation texture at {address:#x}: expected tag {:#x}, found {found:#x}", MAGIC)]
	Magic {
		address: u64,
		found: u8,
	},
	#[error("Paletted texture has no color table")]
	MissingPalette,
	#[error("No texture contains texture page position ({x}, {y})")]
	PageNotFound {
		x: u16,
		y: u16,
	},
	#[error("Palette entries {start}..{end} lie outside the {len} words of the CLUT texture")]
	PaletteRange {
		start: usize,
		end: usize,
		len: usize,
	},
	#[error("Unsupported texture page color mode: {0}")]
	TexMode(u8),
	#[error("Unsupported TIM color format: {0:?}")]
	UnsupportedFormat(ColorFormat),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
	pub magic: u8,
	pub version: u8,
	pub reserved: u16,
	pub flags: Flags,
}

impl Header {
	#[cfg(feature = "import")]
	fn read<R>(address: u64, buf: &mut R) -> Result<Header, TIMImportError>
	where
		R: ReadBytesExt,
	{
		let magic = buf.read_u8()?;
		if magic != MAGIC {
			return Err(TIMImportError::Magic {
				address: address,
				found: magic,
			});
		}

		Ok(Header {
			magic: magic,
			version: buf.read_u8()?,
			reserved: buf.read_u16::<LE>()?,
			flags: Flags::from_bits_truncate(buf.read_u32::<LE>()?),
		})
	}

	pub fn format(&self) -> ColorFormat {
		match (self.flags & Flags::MODE).bits() {
			0 => ColorFormat::Paletted4,
			1 => ColorFormat::Paletted8,
			2 => ColorFormat::Direct16,
			_ => ColorFormat::Direct24,
		}
	}
}

/// Section header shared by the color table and the image data. Positions and sizes are in
/// 16-bit VRAM words.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubHeader {
	pub size: u32,
	pub x: u16,
	pub y: u16,
	pub width: u16,
	pub height: u16,
}

impl SubHeader {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<SubHeader, TIMImportError>
	where
		R: ReadBytesExt,
	{
		Ok(SubHeader {
			size: buf.read_u32::<LE>()?,
			x: buf.read_u16::<LE>()?,
			y: buf.read_u16::<LE>()?,
			width: buf.read_u16::<LE>()?,
			height: buf.read_u16::<LE>()?,
		})
	}

	pub fn num_words(&self) -> usize {
		self.width as usize * self.height as usize
	}

	/// Whether the VRAM position lies inside this rectangle
	pub fn contains(&self, x: u16, y: u16) -> bool {
		let (x, y) = (x as u32, y as u32);

		x >= self.x as u32 && x < self.x as u32 + self.width as u32 &&
			y >= self.y as u32 && y < self.y as u32 + self.height as u32
	}
}

#[cfg(feature = "import")]
fn read_words<R>(count: usize, buf: &mut R) -> Result<Vec<u16>, TIMImportError>
where
	R: ReadBytesExt,
{
	let mut words = vec![];
	for _ in 0..count {
		words.push(buf.read_u16::<LE>()?);
	}
	Ok(words)
}

#[derive(Clone, Debug, PartialEq)]
pub struct PSXTexture {
	pub header: Header,
	pub palette_header: Option<SubHeader>,
	pub palette: Option<Vec<u16>>,
	pub img_header: SubHeader,
	/// Raw VRAM words; how many pixels each holds depends on the color format
	pub data: Vec<u16>,
}

impl PSXTexture {
	/// Reads a TIM image. `address` is only used for error reporting.
	#[cfg(feature = "import")]
	pub fn read<R>(address: u64, buf: &mut R) -> Result<PSXTexture, TIMImportError>
	where
		R: ReadBytesExt,
	{
		let header = Header::read(address, buf)?;

		let mut clut_header = None;
		let mut clut = None;

		if header.flags.contains(Flags::INDEXED) {
			let h = SubHeader::read(buf)?;
			clut = Some(read_words(h.num_words(), buf)?);
			clut_header = Some(h);
		}

		let img_header = SubHeader::read(buf)?;
		let img_data = read_words(img_header.num_words(), buf)?;

		Ok(PSXTexture {
			header: header,
			palette_header: clut_header,
			palette: clut,
			img_header: img_header,
			data: img_data,
		})
	}

	pub fn format(&self) -> ColorFormat {
		self.header.format()
	}

	/// Width in pixels
	pub fn width(&self) -> usize {
		self.format().pixel_width(self.img_header.width as usize)
	}

	pub fn height(&self) -> usize {
		self.img_header.height as usize
	}

	/// The inline color table, decoded
	pub fn palette_colors(&self) -> Option<Vec<Color>> {
		self.palette.as_ref().map(|p| p.iter().map(|c| Color::from_rgba5551(*c)).collect())
	}

	/// Decodes the image on its own, using its inline color table if it is paletted
	#[cfg(feature = "import")]
	pub fn decode(&self) -> Result<Texture, TIMImportError> {
		let (width, height) = (self.width(), self.height());

		match self.format() {
			ColorFormat::Paletted8 => {
				let palette = self.palette_colors().ok_or(TIMImportError::MissingPalette)?;
				let mut texture = Texture::new(width, height);

				for word in self.data.iter() {
					for index in [(*word & 0xFF) as usize, (*word >> 8) as usize] {
						if index >= palette.len() {
							return Err(TIMImportError::PaletteRange {
								start: index,
								end: index + 1,
								len: palette.len(),
							});
						}
						texture.indices.push(index);
					}
				}

				texture.palette = palette;
				Ok(texture)
			},
			ColorFormat::Direct16 => Ok(Texture::from_rgba5551(width, height, &self.data)),
			format => Err(TIMImportError::UnsupportedFormat(format)),
		}
	}
}
