pub mod tim;
pub mod vram;

#[cfg(feature = "import")]
use std::{
	fs,
	io::{
		Read,
		Seek
	}
};

#[cfg(feature = "import")]
use rgk_core::{
	io_ext::SeekBinExt,
	texture::Texture
};

use tim::*;

#[cfg(feature = "import")]
pub fn read_tim(filepath: &str) -> Result<Texture, TIMImportError> {
	let input = fs::read(filepath)?;
	let tex = PSXTexture::read(0, &mut input.as_slice())?;
	tex.decode()
}

/// Reads one TIM image per address. Images are kept raw since material lookups need their VRAM
/// rectangles.
#[cfg(feature = "import")]
pub fn read_all<R>(addresses: &[u64], buf: &mut R) -> Result<Vec<PSXTexture>, TIMImportError>
where
	R: Read + Seek,
{
	let mut textures = Vec::with_capacity(addresses.len());

	for address in addresses.iter() {
		buf.seek_to(*address)?;
		let tex = PSXTexture::read(*address, buf)?;

		tracing::debug!(
			address = *address,
			format = ?tex.format(),
			x = tex.img_header.x,
			y = tex.img_header.y,
			"TIM image read"
		);

		textures.push(tex);
	}

	Ok(textures)
}
