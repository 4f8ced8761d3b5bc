use rgk_core::texture::{
	Color,
	Texture
};

use crate::tim::PSXTexture;

#[cfg(feature = "import")]
use crate::tim::TIMImportError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum TexMode {
	Paletted4 = 0,
	Paletted8,
	Direct16,
	Reserved,
}

impl TexMode {
	pub fn pixels_per_word(&self) -> usize {
		match *self {
			TexMode::Paletted4 => 4,
			TexMode::Paletted8 => 2,
			_ => 1,
		}
	}

	/// Palette entries addressed by one CLUT, if the mode is paletted
	pub fn palette_len(&self) -> Option<usize> {
		match *self {
			TexMode::Paletted4 => Some(16),
			TexMode::Paletted8 => Some(256),
			_ => None,
		}
	}
}

impl From<u8> for TexMode {
	fn from(mode: u8) -> TexMode {
		match mode & 3 {
			0 => TexMode::Paletted4,
			1 => TexMode::Paletted8,
			2 => TexMode::Direct16,
			_ => TexMode::Reserved,
		}
	}
}

/// Decoded texture page attribute word. Names the 64x256 block of VRAM holding a material's
/// pixels, resolved against the rectangles of the uploaded TIM images.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TPage {
	/// VRAM word column of the page
	pub x: u16,
	/// VRAM row of the page
	pub y: u16,
	pub tex_mode: TexMode,
	pub blend_mode: u8,
}

impl TPage {
	pub fn from_word(word: u16) -> TPage {
		TPage {
			x: (word & 0xF) * 64,
			y: ((word >> 4) & 1) * 256,
			blend_mode: ((word >> 5) & 3) as u8,
			tex_mode: TexMode::from(((word >> 7) & 3) as u8),
		}
	}
}

/// Decoded CLUT attribute word, naming the VRAM row holding a palette
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Clut {
	pub x: u16,
	pub y: u16,
}

impl Clut {
	pub fn from_word(word: u16) -> Clut {
		Clut {
			x: (word & 0x3F) * 16,
			y: (word >> 6) & 0x1FF,
		}
	}
}

/// Returns the first texture whose image rectangle contains the VRAM position. Rectangles may
/// overlap; declaration order decides.
pub fn find_texture(textures: &[PSXTexture], x: u16, y: u16) -> Option<&PSXTexture> {
	textures.iter().find(|t| t.img_header.contains(x, y))
}

/// Reads `count` palette entries starting at the CLUT position inside `source`
#[cfg(feature = "import")]
pub fn palette_row(source: &PSXTexture, clut: &Clut, count: usize) -> Result<Vec<Color>, TIMImportError> {
	let rect = &source.img_header;
	if !rect.contains(clut.x, clut.y) {
		return Err(TIMImportError::ClutNotFound {
			x: clut.x,
			y: clut.y,
		});
	}

	let start = (clut.y - rect.y) as usize * rect.width as usize + (clut.x - rect.x) as usize;
	let end = start + count;

	match source.data.get(start..end) {
		Some(words) => Ok(words.iter().map(|w| Color::from_rgba5551(*w)).collect()),
		None => Err(TIMImportError::PaletteRange {
			start: start,
			end: end,
			len: source.data.len(),
		}),
	}
}

/// Renders the texture page addressed by `tpage` as a standalone image, sampling through the
/// palette at `clut`. The texture window offsets are in words and wrap around the page.
#[cfg(feature = "import")]
pub fn render_page(textures: &[PSXTexture], tpage: &TPage, clut: &Clut, window: (i32, i32))
	-> Result<Texture, TIMImportError>
{
	let page = find_texture(textures, tpage.x, tpage.y).ok_or(TIMImportError::PageNotFound {
		x: tpage.x,
		y: tpage.y,
	})?;

	let palette = match tpage.tex_mode {
		TexMode::Reserved => return Err(TIMImportError::TexMode(tpage.tex_mode as u8)),
		TexMode::Direct16 => None,
		mode => {
			let source = find_texture(textures, clut.x, clut.y).ok_or(TIMImportError::ClutNotFound {
				x: clut.x,
				y: clut.y,
			})?;
			Some(palette_row(source, clut, mode.palette_len().unwrap_or(0))?)
		},
	};

	let word_width = page.img_header.width as usize;
	let height = page.img_header.height as usize;
	let per_word = tpage.tex_mode.pixels_per_word();

	if word_width == 0 || height == 0 {
		return Ok(Texture::new(0, 0));
	}

	let mut words = Vec::with_capacity(word_width * height);
	for y in 0..height {
		let sy = (y as i64 + window.1 as i64).rem_euclid(height as i64) as usize;
		for x in 0..word_width {
			let sx = (x as i64 + window.0 as i64).rem_euclid(word_width as i64) as usize;
			words.push(page.data.get(sy * word_width + sx).copied().unwrap_or(0));
		}
	}

	let palette = match palette {
		Some(p) => p,
		None => return Ok(Texture::from_rgba5551(word_width, height, &words)),
	};

	let bits = 16 / per_word;
	let mask = (1u16 << bits) - 1;

	let mut texture = Texture::new(word_width * per_word, height);
	for word in words.iter() {
		for i in 0..per_word {
			texture.indices.push(((*word >> (i * bits)) & mask) as usize);
		}
	}
	texture.palette = palette;

	tracing::trace!(x = tpage.x, y = tpage.y, width = texture.width, height, "texture page rendered");
	Ok(texture)
}
