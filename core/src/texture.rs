use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	pub red: f32,
	pub green: f32,
	pub blue: f32,
	pub alpha: f32,
}

impl Color {
	pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Color {
		Color {
			red: red,
			green: green,
			blue: blue,
			alpha: alpha,
		}
	}

	/// Decodes a PlayStation 15-bit color word with its semi-transparency (STP) bit.
	///
	/// Black with a clear STP bit is the hardware's transparent color; every other word is opaque.
	pub fn from_rgba5551(color: u16) -> Color {
		let red = color & 31;
		let green = (color >> 5) & 31;
		let blue = (color >> 10) & 31;
		let stp = color & 0x8000 != 0;

		Color {
			red: red as f32 / 31.0,
			green: green as f32 / 31.0,
			blue: blue as f32 / 31.0,
			alpha: if red == 0 && green == 0 && blue == 0 && !stp { 0.0 } else { 1.0 },
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
	pub palette: Vec<Color>,
	pub indices: Vec<usize>,
	pub width: usize,
	pub height: usize,
}

impl Texture {
	pub fn new(width: usize, height: usize) -> Texture {
		Texture {
			palette: vec![],
			indices: vec![],
			width: width,
			height: height,
		}
	}

	/// Builds a texture from direct 16-bit color words. Since these carry no palette, one is built
	/// from the distinct words in order of first appearance.
	pub fn from_rgba5551(width: usize, height: usize, words: &[u16]) -> Texture {
		let mut texture = Texture::new(width, height);
		let mut seen: HashMap<u16, usize> = HashMap::new();

		for word in words.iter() {
			let i = *seen.entry(*word).or_insert_with(|| {
				texture.palette.push(Color::from_rgba5551(*word));
				texture.palette.len() - 1
			});
			texture.indices.push(i);
		}

		texture
	}

	/// Uses the palette and indices to build a pixel array
	pub fn pixels(&self) -> Vec<Color> {
		self.indices.iter().map(|i| self.palette[*i]).collect()
	}
}
