use byteorder::{
	LE,
	ReadBytesExt
};

use std::{
	collections::BTreeMap,
	io::{
		Read,
		Seek
	}
};

use ultraviolet::vec::Vec2;

use rgk_core::io_ext::{
	ReadBinExt,
	SeekBinExt
};

#[cfg(feature = "import")]
use crate::import::FF9ImportError;

/// Size of the fixed model header, up to and including the two section pointers
pub const HEADER_SIZE: u64 = 20;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bone {
	/// Distance from the parent joint, in model units
	pub length: u32,
	pub parent: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PolygonType {
	AQuad = 0,
	ATri,
	BQuad,
	BTri,
	CQuad,
	CTri,
}

impl PolygonType {
	/// Storage order within a group's polygon section
	pub const ALL: [PolygonType; 6] = [
		PolygonType::AQuad,
		PolygonType::ATri,
		PolygonType::BQuad,
		PolygonType::BTri,
		PolygonType::CQuad,
		PolygonType::CTri,
	];

	pub fn num_vertices(&self) -> usize {
		match *self {
			PolygonType::AQuad | PolygonType::BQuad | PolygonType::CQuad => 4,
			_ => 3,
		}
	}

	/// Total record size in bytes
	pub fn size(&self) -> usize {
		match *self {
			PolygonType::AQuad => 24,
			PolygonType::ATri => 20,
			PolygonType::BQuad => 32,
			PolygonType::BTri => 24,
			PolygonType::CQuad => 24,
			PolygonType::CTri => 20,
		}
	}
}

/// One polygon record. Only A-type polygons are textured; the bytes trailing the vertex indices
/// of the other types are skipped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Polygon {
	AQuad {
		vertices: [u16; 4],
		uvs: [u16; 4],
		color: [u8; 3],
		material: u8,
	},
	ATri {
		vertices: [u16; 3],
		uvs: [u16; 3],
		color: [u8; 3],
		material: u8,
	},
	BQuad([u16; 4]),
	BTri([u16; 3]),
	CQuad([u16; 4]),
	CTri([u16; 3]),
}

impl Polygon {
	#[cfg(feature = "import")]
	fn read<R>(kind: PolygonType, buf: &mut R) -> Result<Polygon, FF9ImportError>
	where
		R: Read + Seek,
	{
		let polygon = match kind {
			PolygonType::AQuad => {
				let vertices = read_u16s::<_, 4>(buf)?;
				let uvs = read_u16s::<_, 4>(buf)?;
				let mut color = [0; 3];
				buf.read_exact(&mut color)?;
				let material = buf.read_u8()?;
				buf.skip(4)?;

				Polygon::AQuad {
					vertices: vertices,
					uvs: uvs,
					color: color,
					material: material,
				}
			},
			PolygonType::ATri => {
				let vertices = read_u16s::<_, 3>(buf)?;
				let material = buf.read_u8()?;
				buf.skip(1)?;
				let mut color = [0; 3];
				buf.read_exact(&mut color)?;
				buf.skip(1)?;
				let uvs = read_u16s::<_, 3>(buf)?;
				buf.skip(2)?;

				Polygon::ATri {
					vertices: vertices,
					uvs: uvs,
					color: color,
					material: material,
				}
			},
			PolygonType::BQuad => {
				let vertices = read_u16s::<_, 4>(buf)?;
				buf.skip(24)?;
				Polygon::BQuad(vertices)
			},
			PolygonType::BTri => {
				let vertices = read_u16s::<_, 3>(buf)?;
				buf.skip(18)?;
				Polygon::BTri(vertices)
			},
			PolygonType::CQuad => {
				let vertices = read_u16s::<_, 4>(buf)?;
				buf.skip(16)?;
				Polygon::CQuad(vertices)
			},
			PolygonType::CTri => {
				let vertices = read_u16s::<_, 3>(buf)?;
				buf.skip(14)?;
				Polygon::CTri(vertices)
			},
		};

		Ok(polygon)
	}

	pub fn kind(&self) -> PolygonType {
		match *self {
			Polygon::AQuad { .. } => PolygonType::AQuad,
			Polygon::ATri { .. } => PolygonType::ATri,
			Polygon::BQuad(_) => PolygonType::BQuad,
			Polygon::BTri(_) => PolygonType::BTri,
			Polygon::CQuad(_) => PolygonType::CQuad,
			Polygon::CTri(_) => PolygonType::CTri,
		}
	}

	pub fn vertices(&self) -> &[u16] {
		match self {
			Polygon::AQuad { vertices, .. } => &vertices[..],
			Polygon::ATri { vertices, .. } => &vertices[..],
			Polygon::BQuad(v) | Polygon::CQuad(v) => &v[..],
			Polygon::BTri(v) | Polygon::CTri(v) => &v[..],
		}
	}

	/// UV indices; empty for untextured polygons
	pub fn uvs(&self) -> &[u16] {
		match self {
			Polygon::AQuad { uvs, .. } => &uvs[..],
			Polygon::ATri { uvs, .. } => &uvs[..],
			_ => &[],
		}
	}

	pub fn material(&self) -> Option<u8> {
		match *self {
			Polygon::AQuad { material, .. } | Polygon::ATri { material, .. } => Some(material),
			_ => None,
		}
	}

	pub fn color(&self) -> Option<[u8; 3]> {
		match *self {
			Polygon::AQuad { color, .. } | Polygon::ATri { color, .. } => Some(color),
			_ => None,
		}
	}

	/// Corner order of the face. Quads are stored as two-triangle strips and tris wind clockwise.
	pub fn face_order(&self) -> &'static [usize] {
		match self.kind().num_vertices() {
			4 => &[0, 2, 3, 1][..],
			_ => &[0, 2, 1][..],
		}
	}

	/// Vertex indices in face order
	pub fn face(&self) -> Vec<usize> {
		let vertices = self.vertices();
		self.face_order().iter().map(|i| vertices[*i] as usize).collect()
	}
}

#[cfg(feature = "import")]
fn read_u16s<R, const N: usize>(buf: &mut R) -> Result<[u16; N], FF9ImportError>
where
	R: ReadBytesExt,
{
	let mut values = [0; N];
	for v in values.iter_mut() {
		*v = buf.read_u16::<LE>()?;
	}
	Ok(values)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Vertex {
	pub position: [i16; 3],
	pub bone: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UV {
	pub u: u8,
	pub v: u8,
}

/// Group record. Section pointers are stored relative to the model and resolved on read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupHeader {
	pub data_size: u16,
	/// Polygon counts in [`PolygonType::ALL`] order
	pub counts: [u16; 6],
	pub offset: [i16; 3],
	pub bone_ptr: u64,
	pub vertex_ptr: u64,
	pub polygon_ptr: u64,
	pub uv_ptr: u64,
	pub end_ptr: u64,
}

impl GroupHeader {
	#[cfg(feature = "import")]
	fn read<R>(model_addr: u64, buf: &mut R) -> Result<GroupHeader, FF9ImportError>
	where
		R: Read + Seek,
	{
		let data_size = buf.read_u16::<LE>()?;
		let counts = read_u16s::<_, 6>(buf)?;
		let offset = buf.read_i16x3_le()?;

		let mut ptrs = [0u64; 5];
		for p in ptrs.iter_mut() {
			*p = model_addr + buf.read_u32::<LE>()? as u64;
		}

		Ok(GroupHeader {
			data_size: data_size,
			counts: counts,
			offset: offset,
			bone_ptr: ptrs[0],
			vertex_ptr: ptrs[1],
			polygon_ptr: ptrs[2],
			uv_ptr: ptrs[3],
			end_ptr: ptrs[4],
		})
	}

	pub fn count(&self, kind: PolygonType) -> u16 {
		self.counts[kind as usize]
	}

	pub fn num_polygons(&self) -> usize {
		self.counts.iter().map(|c| *c as usize).sum()
	}
}

/// One rigid group of a model with its own polygon, vertex and UV arrays
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
	pub header: GroupHeader,
	pub polygons: Vec<Polygon>,
	pub vertices: Vec<Vertex>,
	pub uvs: Vec<UV>,
}

impl Mesh {
	/// Reads the group's sections. Vertex and UV arrays hold one entry past the highest index
	/// referenced by the polygons.
	#[cfg(feature = "import")]
	pub fn read<R>(header: GroupHeader, buf: &mut R) -> Result<Mesh, FF9ImportError>
	where
		R: Read + Seek,
	{
		buf.seek_to(header.polygon_ptr)?;

		let mut polygons = Vec::with_capacity(header.num_polygons());
		let mut max_vertex = 0;
		let mut max_uv = 0;

		for kind in PolygonType::ALL.iter() {
			for _ in 0..header.count(*kind) {
				let polygon = Polygon::read(*kind, buf)?;

				max_vertex = polygon.vertices().iter().copied().fold(max_vertex, u16::max);
				max_uv = polygon.uvs().iter().copied().fold(max_uv, u16::max);
				polygons.push(polygon);
			}
		}

		buf.seek_to(header.vertex_ptr)?;
		let mut vertices = Vec::with_capacity(max_vertex as usize + 1);
		for _ in 0..=max_vertex {
			let position = buf.read_i16x3_le()?;
			let bone = buf.read_u8()?;
			buf.skip(1)?;

			vertices.push(Vertex {
				position: position,
				bone: bone,
			});
		}

		buf.seek_to(header.uv_ptr)?;
		let mut uvs = Vec::with_capacity(max_uv as usize + 1);
		for _ in 0..=max_uv {
			uvs.push(UV {
				u: buf.read_u8()?,
				v: buf.read_u8()?,
			});
		}

		Ok(Mesh {
			header: header,
			polygons: polygons,
			vertices: vertices,
			uvs: uvs,
		})
	}

	/// Vertex indices grouped by the bone they are weighted to
	pub fn bone_groups(&self) -> BTreeMap<u8, Vec<usize>> {
		let mut groups: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
		for (i, v) in self.vertices.iter().enumerate() {
			groups.entry(v.bone).or_default().push(i);
		}
		groups
	}

	/// Material index of every textured polygon, in storage order
	pub fn material_indices(&self) -> Vec<u8> {
		self.polygons.iter().filter_map(|p| p.material()).collect()
	}

	/// Normalized texture coordinates of a textured polygon, in face order. `dims` holds the pixel
	/// size of each material's image; `v_shift` is added to every V before normalizing.
	pub fn face_uvs(&self, polygon: &Polygon, dims: &[(usize, usize)], v_shift: i32) -> Option<Vec<Vec2>> {
		let (width, height) = *dims.get(polygon.material()? as usize)?;
		if width == 0 || height == 0 {
			return None;
		}

		let uvs = polygon.uvs();
		let mut coords = Vec::with_capacity(uvs.len());

		for i in polygon.face_order().iter() {
			let uv = self.uvs.get(uvs[*i] as usize)?;
			coords.push(Vec2::new(
				uv.u as f32 / width as f32,
				(uv.v as i32 + v_shift) as f32 / height as f32
			));
		}

		Some(coords)
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
	pub num_bones: u8,
	pub num_groups: u8,
	pub data_size: u16,
	pub offset: [i16; 3],
	/// Absolute address of the bone table
	pub bones_ptr: u64,
	/// Absolute address of the group table
	pub groups_ptr: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
	pub address: u64,
	pub header: Header,
	pub bones: Vec<Bone>,
	pub meshes: Vec<Mesh>,
}

impl Model {
	/// Reads the model starting at the current position
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Model, FF9ImportError>
	where
		R: Read + Seek,
	{
		let address = buf.tell()?;

		if let Some(found) = buf.read_zero_u16()? {
			return Err(FF9ImportError::Padding {
				address: address,
				found: found,
			});
		}

		let num_bones = buf.read_u8()?;
		let num_groups = buf.read_u8()?;
		let data_size = buf.read_u16::<LE>()?;
		let offset = buf.read_i16x3_le()?;
		let bones_ptr = address + buf.read_u32::<LE>()? as u64;
		let groups_ptr = address + buf.read_u32::<LE>()? as u64;

		// The tables must follow each other without gaps
		let pos = buf.tell()?;
		if pos != bones_ptr {
			return Err(FF9ImportError::BonePointer {
				expected: bones_ptr,
				found: pos,
			});
		}

		let mut bones = Vec::with_capacity(num_bones as usize);
		for _ in 0..num_bones {
			bones.push(Bone {
				length: buf.read_u24::<LE>()?,
				parent: buf.read_u8()?,
			});
		}

		let pos = buf.tell()?;
		if pos != groups_ptr {
			return Err(FF9ImportError::GroupPointer {
				expected: groups_ptr,
				found: pos,
			});
		}

		let mut groups = Vec::with_capacity(num_groups as usize);
		for _ in 0..num_groups {
			groups.push(GroupHeader::read(address, buf)?);
		}

		let mut meshes = Vec::with_capacity(groups.len());
		for group in groups.into_iter() {
			meshes.push(Mesh::read(group, buf)?);
		}

		tracing::debug!(address, bones = bones.len(), groups = meshes.len(), "model read");

		Ok(Model {
			address: address,
			header: Header {
				num_bones: num_bones,
				num_groups: num_groups,
				data_size: data_size,
				offset: offset,
				bones_ptr: bones_ptr,
				groups_ptr: groups_ptr,
			},
			bones: bones,
			meshes: meshes,
		})
	}

	pub fn num_vertices(&self) -> usize {
		self.meshes.iter().map(|m| m.vertices.len()).sum()
	}

	pub fn num_polygons(&self) -> usize {
		self.meshes.iter().map(|m| m.polygons.len()).sum()
	}
}
