use std::collections::HashMap;

use ultraviolet::vec::Vec3;

use crate::{
	ImportCfg,
	mdl::{
		Mesh,
		Model
	}
};

#[cfg(feature = "import")]
use crate::import::FF9ImportError;

#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
	pub parent: Option<usize>,
	pub children: Vec<usize>,
	/// Stored bone length, in model units
	pub raw_length: u32,
	/// Working length along the bone's forward axis, in scene units
	pub length: f32,
	/// Rest position relative to the parent joint, in scene units
	pub rest_offset: Vec3,
}

impl Joint {
	pub fn is_leaf(&self) -> bool {
		self.children.is_empty()
	}
}

/// Bone hierarchy of one model, rooted at joint 0
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
	pub joints: Vec<Joint>,
}

impl Skeleton {
	/// Builds the joint tree and works out display lengths: a bone is at least as long as the
	/// longest of its children, and a leaf bone reaches the furthest vertex weighted to it.
	#[cfg(feature = "import")]
	pub fn resolve(model: &Model, cfg: &ImportCfg) -> Result<Skeleton, FF9ImportError> {
		let mut joints: Vec<Joint> = Vec::with_capacity(model.bones.len());

		for (i, bone) in model.bones.iter().enumerate() {
			let raw = bone.length as f32 * cfg.scale;
			let parent = if i == 0 { None } else { Some(bone.parent as usize) };

			if let Some(p) = parent {
				if p >= i {
					return Err(FF9ImportError::BoneParent {
						bone: i,
						parent: p,
					});
				}

				joints[p].children.push(i);
				joints[p].length = joints[p].length.max(raw);
			}

			joints.push(Joint {
				parent: parent,
				children: vec![],
				raw_length: bone.length,
				length: cfg.min_bone_length,
				rest_offset: if parent.is_some() { Vec3::new(0.0, raw, 0.0) } else { Vec3::zero() },
			});
		}

		for (bone, depth) in vertex_depths(&model.meshes, cfg.scale) {
			match joints.get_mut(bone as usize) {
				Some(joint) if joint.is_leaf() => joint.length = joint.length.max(depth),
				Some(_) => {},
				None => tracing::debug!(bone, joints = joints.len(), "vertices weighted to a missing bone"),
			}
		}

		Ok(Skeleton {
			joints: joints,
		})
	}

	pub fn len(&self) -> usize {
		self.joints.len()
	}

	pub fn is_empty(&self) -> bool {
		self.joints.is_empty()
	}

	/// Number of joints between `index` and the root
	pub fn depth(&self, index: usize) -> usize {
		let mut depth = 0;
		let mut current = self.joints.get(index).and_then(|j| j.parent);

		while let Some(p) = current {
			depth += 1;
			current = self.joints[p].parent;
		}

		depth
	}
}

/// Largest local depth (Z) of the vertices weighted to each bone, across every group
pub fn vertex_depths(meshes: &[Mesh], scale: f32) -> HashMap<u8, f32> {
	let mut depths: HashMap<u8, f32> = HashMap::new();

	for vertex in meshes.iter().flat_map(|m| m.vertices.iter()) {
		let z = vertex.position[2] as f32 * scale;
		depths.entry(vertex.bone)
			.and_modify(|d| *d = d.max(z))
			.or_insert(z);
	}

	depths
}

#[cfg(all(test, feature = "import"))]
mod tests {
	use std::io::Cursor;

	use crate::mdl::tests::{
		GroupDef,
		atri,
		model_bytes,
		single_tri_model
	};

	use super::*;

	fn chain_model() -> Model {
		// root -> 1 -> 2 -> 3, plus 4 hanging off the root
		let mut polygons = atri([0, 1, 2], [0, 0, 0], 0);
		polygons.extend(atri([3, 4, 4], [0, 0, 0], 0));

		let data = model_bytes(&[(0, 0), (256, 0), (512, 1), (128, 2), (64, 0)], &[GroupDef {
			counts: [0, 2, 0, 0, 0, 0],
			polygons: polygons,
			vertices: vec![
				([0, 0, 100], 0),
				([0, 0, 1024], 3),
				([0, 0, 2048], 3),
				([0, 0, 4096], 2),
				([0, 0, -512], 4),
			],
			uvs: vec![[0, 0]],
		}]);

		Model::read(&mut Cursor::new(data)).unwrap()
	}

	#[test]
	fn test_tree() {
		let skel = Skeleton::resolve(&chain_model(), &ImportCfg::default()).unwrap();

		assert_eq!(5, skel.len());
		assert_eq!(None, skel.joints[0].parent);
		assert_eq!(vec![1, 4], skel.joints[0].children);
		assert_eq!(Some(2), skel.joints[3].parent);
		assert_eq!(3, skel.depth(3));
		assert_eq!(0, skel.depth(0));

		// No joint ever points back at a later one
		for (i, joint) in skel.joints.iter().enumerate().skip(1) {
			assert!(joint.parent.unwrap() < i);
		}
	}

	#[test]
	fn test_lengths() {
		let cfg = ImportCfg::default();
		let skel = Skeleton::resolve(&chain_model(), &cfg).unwrap();

		// Parents stretch to their longest child
		assert_eq!(1.0, skel.joints[0].length);
		assert_eq!(2.0, skel.joints[1].length);
		assert_eq!(0.5, skel.joints[2].length);
		// Leaves reach their furthest vertex; vertex depth is ignored for inner joints
		assert_eq!(8.0, skel.joints[3].length);
		assert_eq!(cfg.min_bone_length, skel.joints[4].length);
	}

	#[test]
	fn test_rest_pose() {
		let skel = Skeleton::resolve(&chain_model(), &ImportCfg::default()).unwrap();

		assert_eq!(Vec3::zero(), skel.joints[0].rest_offset);
		assert_eq!(Vec3::new(0.0, 1.0, 0.0), skel.joints[1].rest_offset);
		assert_eq!(Vec3::new(0.0, 0.25, 0.0), skel.joints[4].rest_offset);
	}

	#[test]
	fn test_single_tri() {
		let model = Model::read(&mut Cursor::new(single_tri_model())).unwrap();
		let skel = Skeleton::resolve(&model, &ImportCfg::default()).unwrap();

		assert_eq!(1.0, skel.joints[0].length);
		assert_eq!(2.0, skel.joints[1].length);
		assert_eq!(256, skel.joints[1].raw_length);
	}

	#[test]
	fn test_forward_parent() {
		let data = model_bytes(&[(0, 0), (16, 2), (16, 0)], &[GroupDef {
			counts: [0; 6],
			polygons: vec![],
			vertices: vec![([0, 0, 0], 0)],
			uvs: vec![[0, 0]],
		}]);
		let model = Model::read(&mut Cursor::new(data)).unwrap();

		assert!(matches!(Skeleton::resolve(&model, &ImportCfg::default()),
			Err(FF9ImportError::BoneParent { bone: 1, parent: 2 })));
	}
}
