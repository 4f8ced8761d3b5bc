use clap::Parser;

use std::{
	fs::File,
	io::BufReader
};

use tracing_subscriber::EnvFilter;

use rgk_models_finalfantasy9::{
	ImportCfg,
	ImportFlag,
	import::FF9ImportError,
	import_model,
	list_models
};

#[derive(Parser)]
#[command(name = "rgk-models-finalfantasy9", about = "Dump Final Fantasy IX models from a disc archive")]
struct Args {
	/// Disc archive (FF9.IMG)
	archive: String,
	/// Directory index within the archive
	#[arg(short, long)]
	directory: usize,
	/// Model file index within the directory
	#[arg(short, long, default_value_t = 0)]
	model: usize,
	/// List the directory's model files instead of importing one
	#[arg(long)]
	list: bool,
	#[arg(long)]
	no_textures: bool,
	#[arg(long)]
	no_animations: bool,
}

fn main() -> Result<(), FF9ImportError> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	let mut buf = BufReader::new(File::open(&args.archive)?);

	if args.list {
		for (i, file) in list_models(&mut buf, args.directory)?.iter().enumerate() {
			println!("{:4}: id {:5} at {:#010x}", i, file.id, file.address());
		}
		return Ok(());
	}

	let mut cfg = ImportCfg::default();
	if args.no_textures {
		cfg.flags.remove(ImportFlag::TEXTURES);
	}
	if args.no_animations {
		cfg.flags.remove(ImportFlag::ANIMATIONS);
	}

	let import = import_model(&mut buf, args.directory, args.model, &cfg)?;

	println!("Model file {} at {:#x}", args.model, import.file.address());
	for m in import.models.iter() {
		println!("  object {}: {} bones, {} groups, {} vertices, {} polygons",
			m.id, m.skeleton.len(), m.model.meshes.len(), m.model.num_vertices(), m.model.num_polygons());

		if let Some(ref anims) = m.animations {
			println!("    {} clips, {} skipped", anims.clips.len(), anims.skipped.len());
		}
	}

	if let Some(ref textures) = import.textures {
		let mut ids: Vec<&u16> = textures.keys().collect();
		ids.sort();

		for id in ids {
			let sizes: Vec<String> = textures[id].iter().map(|t| format!("{}x{}", t.width, t.height)).collect();
			println!("  textures for mesh {}: {}", id, sizes.join(", "));
		}
	}

	if let Some(last) = import.last_frame {
		println!("  timeline: frames 1..={}", last);
	}

	Ok(())
}
