pub mod anim;
pub mod material;
pub mod mdl;
pub mod skeleton;

use bitflags::bitflags;

use std::{
	collections::HashMap,
	fs::File,
	io::{
		BufReader,
		Read,
		Seek
	}
};

use rgk_archives_finalfantasy9::{
	ArchiveIndex,
	DataBlockTree,
	FileHeader,
	FilePointer,
	FileType
};

use rgk_core::{
	io_ext::SeekBinExt,
	texture::Texture
};

use rgk_textures_playstation::read_all;

use anim::{
	Animations,
	read_animations
};

use material::MaterialInfo;
use mdl::Model;
use skeleton::Skeleton;

#[cfg(feature = "import")]
use import::FF9ImportError;

bitflags! {
	pub struct ImportFlag: u32 {
		/// Decode the model's textures
		const TEXTURES = 1;
		/// Decode the animation file next to the model
		const ANIMATIONS = 2;
		/// Render textures through the model's material records when it has them
		const MATERIAL_INFO = 4;
	}
}

impl Default for ImportFlag {
	fn default() -> Self {
		ImportFlag::TEXTURES | ImportFlag::ANIMATIONS | ImportFlag::MATERIAL_INFO
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportCfg {
	pub flags: ImportFlag,
	/// Model units to scene units
	pub scale: f32,
	pub min_bone_length: f32,
	/// Directories whose models are imported without textures
	pub untextured_directories: Vec<usize>,
	/// Directories whose texture coordinates are shifted down by [`WEAPON_V_SHIFT`] texels
	pub weapon_directories: Vec<usize>,
}

impl Default for ImportCfg {
	fn default() -> Self {
		Self {
			flags: ImportFlag::default(),
			scale: 1.0 / 256.0,
			min_bone_length: 0.1,
			untextured_directories: vec![3, 4],
			weapon_directories: vec![8],
		}
	}
}

/// Texel offset of weapon textures within their page
pub const WEAPON_V_SHIFT: i32 = 16;

/// Images of each mesh, keyed by mesh identifier and indexed by polygon material
pub type TextureMap = HashMap<u16, Vec<Texture>>;

#[derive(Clone, Debug, PartialEq)]
pub struct ImportedModel {
	/// Object identifier within the model file
	pub id: u16,
	pub model: Model,
	pub skeleton: Skeleton,
	pub animations: Option<Animations>,
}

/// Everything decoded for one model file
#[derive(Clone, Debug, PartialEq)]
pub struct ModelImport {
	pub directory: usize,
	pub file: FilePointer,
	pub models: Vec<ImportedModel>,
	pub textures: Option<TextureMap>,
	/// Added to every V coordinate before normalizing
	pub v_shift: i32,
	/// Highest timeline frame reached by any model's animations
	pub last_frame: Option<u32>,
}

#[cfg(feature = "import")]
pub mod import {
	use std::io;
	use thiserror::Error;

	use rgk_archives_finalfantasy9::import::ArchiveImportError;
	use rgk_textures_playstation::tim::TIMImportError;

	#[derive(Debug, Error)]
	pub enum FF9ImportError {
		#[error("Archive error")]
		Archive {
			#[from]
			source: ArchiveImportError,
		},
		#[error("Bone {bone} has parent {parent}, which does not precede it")]
		BoneParent {
			bone: usize,
			parent: usize,
		},
		#[error("Bone table expected at {expected:#x}, header ends at {found:#x}")]
		BonePointer {
			expected: u64,
			found: u64,
		},
		#[error("Group table expected at {expected:#x}, bone table ends at {found:#x}")]
		GroupPointer {
			expected: u64,
			found: u64,
		},
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("Model index {index} out of bounds ({count} model files)")]
		ModelIndex {
			index: usize,
			count: usize,
		},
		#[error("No model files found in directory {0}")]
		NoModels(usize),
		#[error("Nonzero padding at {address:#x}: {found:#x}")]
		Padding {
			address: u64,
			found: u16,
		},
		#[error("Texture error")]
		Texture {
			#[from]
			source: TIMImportError,
		},
	}

	/// Failure confined to one animation object
	#[derive(Debug, Error)]
	pub enum AnimImportError {
		#[error("Angle {value} of bone {bone} at frame {frame} exceeds a full turn")]
		AngleRange {
			bone: usize,
			frame: u16,
			value: u16,
		},
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("Invalid channel mask at {address:#x}: {found:#x}")]
		Mask {
			address: u64,
			found: u16,
		},
		#[error("Nonzero padding at {address:#x}: {found:#x}")]
		Padding {
			address: u64,
			found: u16,
		},
	}
}

/// Lists the model files of a directory, in the order [`import_model`] indexes them
#[cfg(feature = "import")]
pub fn list_models<R>(buf: &mut R, directory: usize) -> Result<Vec<FilePointer>, FF9ImportError>
where
	R: Read + Seek,
{
	let tree = read_tree(buf, directory)?;
	Ok(tree.collect_files(&tree.roots, FileType::Model))
}

#[cfg(feature = "import")]
fn read_tree<R>(buf: &mut R, directory: usize) -> Result<DataBlockTree, FF9ImportError>
where
	R: Read + Seek,
{
	buf.seek_to(0)?;
	let index = ArchiveIndex::read(buf)?;
	Ok(DataBlockTree::read_directory(index.directory(directory)?, buf)?)
}

/// Decodes the `model`-th model file of a directory along with the textures and animations stored
/// next to it
#[cfg(feature = "import")]
pub fn import_model<R>(buf: &mut R, directory: usize, model: usize, cfg: &ImportCfg)
	-> Result<ModelImport, FF9ImportError>
where
	R: Read + Seek,
{
	let tree = read_tree(buf, directory)?;

	let model_files = tree.collect_files(&tree.roots, FileType::Model);
	tracing::debug!(directory, count = model_files.len(), "model files collected");

	if model_files.is_empty() {
		return Err(FF9ImportError::NoModels(directory));
	}

	let file = *model_files.get(model).ok_or(FF9ImportError::ModelIndex {
		index: model,
		count: model_files.len(),
	})?;

	// Animations live beside the model, textures and materials one level up
	let parent: Vec<usize> = file.parent.into_iter().collect();
	let grandparent: Vec<usize> = file.parent
		.map(|p| tree.parent(p).unwrap_or(p))
		.into_iter()
		.collect();

	let header = FileHeader::read_at(file.address(), buf)?;

	let textures = if cfg.flags.contains(ImportFlag::TEXTURES) && !cfg.untextured_directories.contains(&directory) {
		read_textures(&tree, &grandparent, &header, cfg, buf)?
	} else {
		None
	};

	let mut anim_header = None;
	if cfg.flags.contains(ImportFlag::ANIMATIONS) {
		if let Some(anim_file) = tree.collect_files(&parent, FileType::Animation).first() {
			anim_header = Some(FileHeader::read_at(anim_file.address(), buf)?);
		}
	}

	let mut models = Vec::with_capacity(header.ids.len());
	for (id, address) in header.objects() {
		buf.seek_to(address)?;
		let model = Model::read(buf)?;
		let skeleton = Skeleton::resolve(&model, cfg)?;

		let animations = anim_header.as_ref()
			.map(|h| read_animations(h, skeleton.len(), cfg.scale, buf));

		models.push(ImportedModel {
			id: id,
			model: model,
			skeleton: skeleton,
			animations: animations,
		});
	}

	let last_frame = models.iter()
		.filter_map(|m| m.animations.as_ref().map(|a| a.last_frame))
		.max();

	tracing::info!(
		directory,
		model,
		objects = models.len(),
		textured = textures.is_some(),
		last_frame = ?last_frame,
		"model imported"
	);

	Ok(ModelImport {
		directory: directory,
		file: file,
		models: models,
		textures: textures,
		v_shift: if cfg.weapon_directories.contains(&directory) { WEAPON_V_SHIFT } else { 0 },
		last_frame: last_frame,
	})
}

/// Decodes the first texture file found below `blocks`. With material records present, each mesh
/// gets one rendered page per material slot; otherwise every image is decoded on its own and
/// shared by all model objects.
#[cfg(feature = "import")]
fn read_textures<R>(tree: &DataBlockTree, blocks: &[usize], model_header: &FileHeader, cfg: &ImportCfg, buf: &mut R)
	-> Result<Option<TextureMap>, FF9ImportError>
where
	R: Read + Seek,
{
	let tex_file = match tree.collect_files(blocks, FileType::TimImage).first() {
		Some(f) => *f,
		None => return Ok(None),
	};

	let tex_header = FileHeader::read_at(tex_file.address(), buf)?;
	let images = read_all(&tex_header.offsets, buf)?;

	let mat_file = if cfg.flags.contains(ImportFlag::MATERIAL_INFO) {
		tree.collect_files(blocks, FileType::ClutAndTPages).first().copied()
	} else {
		None
	};

	let mut map = TextureMap::new();

	if let Some(mat_file) = mat_file {
		let mat_header = FileHeader::read_at(mat_file.address(), buf)?;

		for info in MaterialInfo::read_all(&mat_header, buf)?.iter() {
			map.insert(info.mesh_id, info.render(&images)?);
		}

		tracing::debug!(meshes = map.len(), images = images.len(), "materials rendered");
	} else {
		let mut decoded = Vec::with_capacity(images.len());
		for image in images.iter() {
			decoded.push(image.decode()?);
		}

		for id in model_header.ids.iter() {
			map.insert(*id, decoded.clone());
		}

		tracing::debug!(images = decoded.len(), "standalone textures decoded");
	}

	Ok(Some(map))
}

#[cfg(feature = "import")]
pub fn read(filepath: &str, directory: usize, model: usize, cfg: &ImportCfg) -> Result<ModelImport, FF9ImportError> {
	let mut buf = BufReader::new(File::open(filepath)?);
	import_model(&mut buf, directory, model, cfg)
}

#[cfg(all(test, feature = "import"))]
mod tests {
	use byteorder::{
		LE,
		WriteBytesExt
	};

	use std::io::Cursor;

	use rgk_archives_finalfantasy9::{
		DBCHUNK,
		SECTOR_SIZE,
		import::ArchiveImportError
	};

	use crate::{
		anim::tests::anim_bytes,
		material::tests::material_bytes,
		mdl::tests::single_tri_model
	};

	use super::*;

	fn place(image: &mut Vec<u8>, at: u64, bytes: &[u8]) {
		let at = at as usize;
		if image.len() < at + bytes.len() {
			image.resize(at + bytes.len(), 0);
		}
		image[at..at + bytes.len()].copy_from_slice(bytes);
	}

	fn file_header(base: u64, objects: &[(u16, u64)]) -> Vec<u8> {
		let mut out = vec![DBCHUNK, objects.len() as u8, 0, 0];
		for (id, _) in objects.iter() {
			out.write_u16::<LE>(*id).unwrap();
		}
		if objects.len() % 2 != 0 {
			out.write_u16::<LE>(0).unwrap();
		}
		for (_, target) in objects.iter() {
			let field = base + out.len() as u64;
			out.write_i32::<LE>((*target - field) as i32).unwrap();
		}
		out.write_u32::<LE>(0).unwrap();
		out
	}

	fn data_block(base: u64, records: &[(u64, FileType)]) -> Vec<u8> {
		let mut out = vec![DBCHUNK, records.len() as u8, 0, 0];
		for (target, kind) in records.iter() {
			let field = base + out.len() as u64;
			out.write_u24::<LE>((*target - field) as u32).unwrap();
			out.write_u8(*kind as u8).unwrap();
		}
		out
	}

	fn tim(mode: u32, palette: Option<(&[u16], [u16; 4])>, rect: [u16; 4], words: &[u16]) -> Vec<u8> {
		let mut out = vec![0x10, 0, 0, 0];
		out.write_u32::<LE>(mode | if palette.is_some() { 8 } else { 0 }).unwrap();

		if let Some((entries, prect)) = palette {
			out.write_u32::<LE>(12 + entries.len() as u32 * 2).unwrap();
			for v in prect.iter().chain(entries.iter()) {
				out.write_u16::<LE>(*v).unwrap();
			}
		}

		out.write_u32::<LE>(12 + words.len() as u32 * 2).unwrap();
		for v in rect.iter().chain(words.iter()) {
			out.write_u16::<LE>(*v).unwrap();
		}
		out
	}

	const ROOT: u64 = 2 * SECTOR_SIZE;
	const NESTED_HEADER: u64 = ROOT + 0x100;
	const CHILD: u64 = ROOT + 0x180;
	const MATERIALS: u64 = ROOT + 0x200;
	const MODELS: u64 = ROOT + 0x300;
	const ANIMS: u64 = ROOT + 0x400;
	const TEXTURES: u64 = ROOT + 0x800;

	/// Directory 0 holds one DataBlock. Its root carries the texture file (and optionally the
	/// material file) plus a nested list whose only block carries the model and animation files.
	fn archive(materials: bool) -> Vec<u8> {
		let mut image = b"FF9 ".to_vec();
		for v in [1u32, 1, 0, 2, 1, 1, 2] {
			image.write_u32::<LE>(v).unwrap();
		}

		place(&mut image, SECTOR_SIZE, &[0, 0, 0x1B, 0, 2, 0, 0, 0]);

		let mut root = vec![(NESTED_HEADER, FileType::DataBlock), (TEXTURES, FileType::TimImage)];
		if materials {
			root.push((MATERIALS, FileType::ClutAndTPages));
		}
		place(&mut image, ROOT, &data_block(ROOT, &root));
		place(&mut image, NESTED_HEADER, &file_header(NESTED_HEADER, &[(0, CHILD)]));
		place(&mut image, CHILD, &data_block(CHILD, &[(MODELS, FileType::Model), (ANIMS, FileType::Animation)]));

		// A 2x1-word 8bpp page at (320, 256) with its own 16-entry palette, and a 16bpp image
		// covering the CLUT row at (48, 481)
		let mut palette = vec![0x8000u16; 256];
		palette[1] = 0x001F;
		let page = tim(1, Some((&palette[..16], [0, 480, 16, 1])), [320, 256, 2, 1], &[0x0001, 0x0100]);
		let clut = tim(2, None, [48, 481, 256, 1], &palette);

		place(&mut image, TEXTURES, &file_header(TEXTURES, &[(0, TEXTURES + 0x20), (1, TEXTURES + 0x80)]));
		place(&mut image, TEXTURES + 0x20, &page);
		place(&mut image, TEXTURES + 0x80, &clut);

		if materials {
			place(&mut image, MATERIALS, &file_header(MATERIALS, &[(7, MATERIALS + 0x20)]));
			place(&mut image, MATERIALS + 0x20, &material_bytes(7, &[(0x00D5, 0x7843, (0, 0))]));
		}

		place(&mut image, MODELS, &file_header(MODELS, &[(7, MODELS + 0x20)]));
		place(&mut image, MODELS + 0x20, &single_tri_model());

		// First object decodes, second has a bad mask, third decodes
		let good = anim_bytes(2, [0, 0, 0], 7, &[([0, 0, 0], 7), ([0x40, 0, 0], 7)], None, &[]);
		let mut bad = good.clone();
		bad[10] = 0x10;
		let short = anim_bytes(3, [0, 0, 0], 7, &[([0, 0, 0], 7), ([0, 0, 0], 7)], None, &[]);

		place(&mut image, ANIMS, &file_header(ANIMS, &[(0, ANIMS + 0x40), (1, ANIMS + 0x80), (2, ANIMS + 0xC0)]));
		place(&mut image, ANIMS + 0x40, &good);
		place(&mut image, ANIMS + 0x80, &bad);
		place(&mut image, ANIMS + 0xC0, &short);

		image
	}

	#[test]
	fn test_import_standalone() {
		let mut buf = Cursor::new(archive(false));
		let import = import_model(&mut buf, 0, 0, &ImportCfg::default()).unwrap();

		assert_eq!(1, import.models.len());
		let imported = &import.models[0];
		assert_eq!(7, imported.id);
		assert_eq!(1, imported.model.num_vertices());
		assert_eq!(1, imported.model.num_polygons());
		assert_eq!(2, imported.skeleton.len());

		// Without material records every image decodes on its own
		let textures = import.textures.unwrap();
		let images = textures.get(&7).unwrap();
		assert_eq!(2, images.len());
		assert_eq!((4, 1), (images[0].width, images[0].height));
		assert_eq!(vec![1, 0, 0, 1], images[0].indices);
		assert_eq!((256, 1), (images[1].width, images[1].height));

		let anims = imported.animations.as_ref().unwrap();
		assert_eq!(2, anims.clips.len());
		assert_eq!(vec![1], anims.skipped);
		assert_eq!(1, anims.clips[0].start_frame);
		assert_eq!(3, anims.clips[1].start_frame);
		assert_eq!(5, anims.last_frame);
		assert_eq!(Some(5), import.last_frame);
		assert_eq!(0, import.v_shift);
	}

	#[test]
	fn test_import_material_info() {
		let mut buf = Cursor::new(archive(true));
		let import = import_model(&mut buf, 0, 0, &ImportCfg::default()).unwrap();

		let textures = import.textures.unwrap();
		let images = textures.get(&7).unwrap();
		assert_eq!(1, images.len());
		assert_eq!(vec![1, 0, 0, 1], images[0].indices);
		assert_eq!(256, images[0].palette.len());
		assert_eq!(rgk_core::texture::Color::new(1.0, 0.0, 0.0, 1.0), images[0].pixels()[0]);
	}

	#[test]
	fn test_flags() {
		let cfg = ImportCfg {
			flags: ImportFlag::empty(),
			..ImportCfg::default()
		};

		let import = import_model(&mut Cursor::new(archive(true)), 0, 0, &cfg).unwrap();
		assert!(import.textures.is_none());
		assert!(import.models[0].animations.is_none());
		assert_eq!(None, import.last_frame);
	}

	#[test]
	fn test_untextured_directory() {
		let cfg = ImportCfg {
			untextured_directories: vec![0],
			..ImportCfg::default()
		};

		let import = import_model(&mut Cursor::new(archive(false)), 0, 0, &cfg).unwrap();
		assert!(import.textures.is_none());
		assert!(import.models[0].animations.is_some());
	}

	#[test]
	fn test_bad_indices() {
		let mut buf = Cursor::new(archive(false));
		assert!(matches!(import_model(&mut buf, 0, 1, &ImportCfg::default()),
			Err(FF9ImportError::ModelIndex { index: 1, count: 1 })));
		assert!(matches!(import_model(&mut buf, 3, 0, &ImportCfg::default()),
			Err(FF9ImportError::Archive { source: ArchiveImportError::DirectoryIndex { index: 3, count: 1 } })));
		assert_eq!(1, list_models(&mut buf, 0).unwrap().len());
	}
}
