use byteorder::{
	LE,
	ReadBytesExt
};

use std::io::{
	Read,
	Seek
};

use rgk_archives_finalfantasy9::FileHeader;

use rgk_core::{
	io_ext::{
		ReadBinExt,
		SeekBinExt
	},
	texture::Texture
};

use rgk_textures_playstation::{
	tim::PSXTexture,
	vram::{
		Clut,
		TPage,
		render_page
	}
};

#[cfg(feature = "import")]
use crate::import::FF9ImportError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialSlot {
	pub tpage: TPage,
	pub clut: Clut,
	/// Texture window offset, in VRAM words
	pub window: (u8, u8),
	/// Face and eye placement bytes; not decoded further
	pub face_eye: [u8; 4],
	pub reserved: u16,
}

impl MaterialSlot {
	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<MaterialSlot, FF9ImportError>
	where
		R: ReadBytesExt,
	{
		let tpage = TPage::from_word(buf.read_u16::<LE>()?);
		let clut = Clut::from_word(buf.read_u16::<LE>()?);
		let window = (buf.read_u8()?, buf.read_u8()?);
		let mut face_eye = [0; 4];
		buf.read_exact(&mut face_eye)?;

		Ok(MaterialSlot {
			tpage: tpage,
			clut: clut,
			window: window,
			face_eye: face_eye,
			reserved: buf.read_u16::<LE>()?,
		})
	}
}

/// One record of a CLUT/tpage file: the VRAM page and palette each material slot of a mesh
/// samples from
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialInfo {
	pub address: u64,
	pub mesh_id: u16,
	pub default_anim: u16,
	pub slots: Vec<MaterialSlot>,
}

impl MaterialInfo {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<MaterialInfo, FF9ImportError>
	where
		R: Read + Seek,
	{
		let address = buf.tell()?;
		let mesh_id = buf.read_u16::<LE>()?;
		let default_anim = buf.read_u16::<LE>()?;
		let count = buf.read_u8()?;
		buf.skip(1)?;

		if let Some(found) = buf.read_zero_u16()? {
			return Err(FF9ImportError::Padding {
				address: address + 6,
				found: found,
			});
		}

		let mut slots = Vec::with_capacity(count as usize);
		for _ in 0..count {
			slots.push(MaterialSlot::read(buf)?);
		}

		Ok(MaterialInfo {
			address: address,
			mesh_id: mesh_id,
			default_anim: default_anim,
			slots: slots,
		})
	}

	/// Reads every record of a material file
	#[cfg(feature = "import")]
	pub fn read_all<R>(header: &FileHeader, buf: &mut R) -> Result<Vec<MaterialInfo>, FF9ImportError>
	where
		R: Read + Seek,
	{
		let mut infos = Vec::with_capacity(header.offsets.len());
		for offset in header.offsets.iter() {
			buf.seek_to(*offset)?;
			infos.push(MaterialInfo::read(buf)?);
		}
		Ok(infos)
	}

	/// Renders one image per material slot from the TIM images uploaded to VRAM
	#[cfg(feature = "import")]
	pub fn render(&self, textures: &[PSXTexture]) -> Result<Vec<Texture>, FF9ImportError> {
		let mut images = Vec::with_capacity(self.slots.len());

		for slot in self.slots.iter() {
			let window = (slot.window.0 as i32, slot.window.1 as i32);
			images.push(render_page(textures, &slot.tpage, &slot.clut, window)?);
		}

		Ok(images)
	}
}
