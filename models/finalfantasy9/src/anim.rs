use bitflags::bitflags;

use byteorder::{
	LE,
	ReadBytesExt
};

use std::{
	f32::consts::{
		PI,
		TAU
	},
	io::{
		Read,
		Seek
	}
};

use ultraviolet::{
	bivec::Bivec3,
	rotor::Rotor3,
	vec::Vec3
};

use rgk_archives_finalfantasy9::FileHeader;

use rgk_core::io_ext::{
	ReadBinExt,
	SeekBinExt
};

#[cfg(feature = "import")]
use crate::import::AnimImportError;

/// Full turn in angle units
pub const ANGLE_STEPS: u16 = 4096;

/// Size of an angle table record: three channel words and a mask
pub const ANGLE_RECORD_SIZE: u64 = 8;

bitflags! {
	/// Channels holding one constant for the whole clip instead of a per-frame table
	pub struct ChannelMask: u16 {
		const X = 1;
		const Y = 2;
		const Z = 4;
	}
}

impl ChannelMask {
	const AXES: [ChannelMask; 3] = [ChannelMask::X, ChannelMask::Y, ChannelMask::Z];

	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> Result<ChannelMask, AnimImportError>
	where
		R: Read + Seek,
	{
		let address = buf.tell()?;
		let mask = buf.read_u16::<LE>()?;

		ChannelMask::from_bits(mask).ok_or(AnimImportError::Mask {
			address: address,
			found: mask,
		})
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimHeader {
	pub address: u64,
	pub num_frames: u16,
	/// Root position channels: constants or table offsets, depending on `mask`
	pub position: [u16; 3],
	pub mask: ChannelMask,
	/// Offset of the per-bone high angle records
	pub high_ptr: u32,
	/// Offset of the per-bone low angle records; 0 if there are none
	pub low_ptr: u32,
}

impl AnimHeader {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<AnimHeader, AnimImportError>
	where
		R: Read + Seek,
	{
		let address = buf.tell()?;

		if let Some(found) = buf.read_zero_u16()? {
			return Err(AnimImportError::Padding {
				address: address,
				found: found,
			});
		}

		let num_frames = buf.read_u16::<LE>()?;
		let position = [buf.read_u16::<LE>()?, buf.read_u16::<LE>()?, buf.read_u16::<LE>()?];
		let mask = ChannelMask::read(buf)?;

		Ok(AnimHeader {
			address: address,
			num_frames: num_frames,
			position: position,
			mask: mask,
			high_ptr: buf.read_u32::<LE>()?,
			low_ptr: buf.read_u32::<LE>()?,
		})
	}

	/// Reads one sample of a 16-bit position channel
	#[cfg(feature = "import")]
	fn position_channel<R>(&self, axis: usize, frame: u16, buf: &mut R) -> Result<i16, AnimImportError>
	where
		R: Read + Seek,
	{
		let value = self.position[axis];

		if self.mask.contains(ChannelMask::AXES[axis]) {
			return Ok(value as i16);
		}

		buf.seek_to(self.address + value as u64 + 2 * frame as u64)?;
		Ok(buf.read_i16::<LE>()?)
	}

	/// Root position at `frame`, converted to the scene's axes
	#[cfg(feature = "import")]
	pub fn position<R>(&self, frame: u16, scale: f32, buf: &mut R) -> Result<Vec3, AnimImportError>
	where
		R: Read + Seek,
	{
		let x = self.position_channel(0, frame, buf)? as f32;
		let y = self.position_channel(1, frame, buf)? as f32;
		let z = self.position_channel(2, frame, buf)? as f32;

		Ok(Vec3::new(x * scale, -y * scale, -z * scale))
	}

	/// Joint orientation at `frame`
	#[cfg(feature = "import")]
	pub fn rotation<R>(&self, bone: usize, frame: u16, buf: &mut R) -> Result<Rotor3, AnimImportError>
	where
		R: Read + Seek,
	{
		let record_addr = |ptr: u32| self.address + ptr as u64 + bone as u64 * ANGLE_RECORD_SIZE;

		let high = AngleRecord::read(record_addr(self.high_ptr), buf)?.sample(self.address, frame, buf)?;
		let low = match self.low_ptr {
			0 => [0; 3],
			ptr => AngleRecord::read(record_addr(ptr), buf)?.sample(self.address, frame, buf)?,
		};

		let mut angles = [0.0; 3];
		for axis in 0..3 {
			let value = ((high[axis] as u16) << 4) + (low[axis] & 0x0F) as u16;
			if value >= ANGLE_STEPS {
				return Err(AnimImportError::AngleRange {
					bone: bone,
					frame: frame,
					value: value,
				});
			}
			angles[axis] = value as f32 / ANGLE_STEPS as f32 * TAU;
		}

		Ok(compose(angles[0], angles[1], angles[2]))
	}
}

/// Orientation from yaw about +X, then pitch about -Z, then roll about +Y
pub fn compose(yaw: f32, pitch: f32, roll: f32) -> Rotor3 {
	let rot_x = axis_angle(Vec3::new(1.0, 0.0, 0.0), yaw);
	let rot_y = axis_angle(Vec3::new(0.0, 0.0, -1.0), pitch);
	let rot_z = axis_angle(Vec3::new(0.0, 1.0, 0.0), roll);

	rot_z * rot_y * rot_x
}

pub fn axis_angle(axis: Vec3, angle: f32) -> Rotor3 {
	Rotor3::from_angle_plane(angle, Bivec3::from_normalized_axis(axis))
}

/// Turns the root joint from the disc's Y-down frame into the scene's Z-up frame
pub fn root_correction() -> Rotor3 {
	axis_angle(Vec3::new(1.0, 0.0, 0.0), 3.0 * PI / 2.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct AngleRecord {
	values: [u16; 3],
	mask: ChannelMask,
}

impl AngleRecord {
	#[cfg(feature = "import")]
	fn read<R>(address: u64, buf: &mut R) -> Result<AngleRecord, AnimImportError>
	where
		R: Read + Seek,
	{
		buf.seek_to(address)?;
		let values = [buf.read_u16::<LE>()?, buf.read_u16::<LE>()?, buf.read_u16::<LE>()?];

		Ok(AngleRecord {
			values: values,
			mask: ChannelMask::read(buf)?,
		})
	}

	/// One byte per axis: the low byte of the constant, or the frame's entry of the byte table
	#[cfg(feature = "import")]
	fn sample<R>(&self, base: u64, frame: u16, buf: &mut R) -> Result<[u8; 3], AnimImportError>
	where
		R: Read + Seek,
	{
		let mut bytes = [0; 3];

		for (axis, byte) in bytes.iter_mut().enumerate() {
			let value = self.values[axis];

			*byte = if self.mask.contains(ChannelMask::AXES[axis]) {
				(value & 0xFF) as u8
			} else {
				buf.seek_to(base + value as u64 + frame as u64)?;
				buf.read_u8()?
			};
		}

		Ok(bytes)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
	pub frame: u32,
	/// Root joint position
	pub position: Vec3,
	/// One orientation per joint, root correction included
	pub rotations: Vec<Rotor3>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimClip {
	pub id: u16,
	pub header: AnimHeader,
	/// Timeline frame of the clip's first keyframe
	pub start_frame: u32,
	pub keyframes: Vec<Keyframe>,
}

impl AnimClip {
	/// Decodes one animation object for a skeleton of `num_bones` joints
	#[cfg(feature = "import")]
	pub fn read<R>(id: u16, address: u64, num_bones: usize, start_frame: u32, scale: f32, buf: &mut R)
		-> Result<AnimClip, AnimImportError>
	where
		R: Read + Seek,
	{
		buf.seek_to(address)?;
		let header = AnimHeader::read(buf)?;
		let correction = root_correction();

		let mut keyframes = Vec::with_capacity(header.num_frames as usize);
		for frame in 0..header.num_frames {
			let position = header.position(frame, scale, buf)?;

			let mut rotations = Vec::with_capacity(num_bones);
			for bone in 0..num_bones {
				let rot = header.rotation(bone, frame, buf)?;
				rotations.push(if bone == 0 { correction * rot } else { rot });
			}

			keyframes.push(Keyframe {
				frame: start_frame + frame as u32,
				position: position,
				rotations: rotations,
			});
		}

		Ok(AnimClip {
			id: id,
			header: header,
			start_frame: start_frame,
			keyframes: keyframes,
		})
	}

	pub fn num_frames(&self) -> u32 {
		self.keyframes.len() as u32
	}
}

/// Every clip of an animation file that decoded cleanly, laid back to back on one timeline
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Animations {
	pub clips: Vec<AnimClip>,
	/// Objects that failed to decode, by index within the file
	pub skipped: Vec<usize>,
	/// Last timeline frame covered by a clip; 0 if none decoded
	pub last_frame: u32,
}

/// Decodes every object of an animation file. The file gives no hint as to which objects fit the
/// skeleton, so objects that fail to decode are logged and left out; they take up no frames.
#[cfg(feature = "import")]
pub fn read_animations<R>(header: &FileHeader, num_bones: usize, scale: f32, buf: &mut R) -> Animations
where
	R: Read + Seek,
{
	let mut anims = Animations::default();
	let mut start = 1;

	for (i, (id, address)) in header.objects().enumerate() {
		match AnimClip::read(id, address, num_bones, start, scale, buf) {
			Ok(clip) => {
				start += clip.num_frames();
				anims.clips.push(clip);
			},
			Err(e) => {
				tracing::warn!(index = i, address, error = %e, "skipping animation");
				anims.skipped.push(i);
			},
		}
	}

	anims.last_frame = start - 1;
	tracing::debug!(clips = anims.clips.len(), skipped = anims.skipped.len(), last_frame = anims.last_frame,
		"animations read");

	anims
}
