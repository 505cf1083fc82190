use clap::{App, Arg, SubCommand};
use icoedit::Entry;
use std::fs;
use std::path::PathBuf;

//===========================================================================//

fn main() {
    let matches = App::new("icotool")
        .version("0.1")
        .about("Inspects and rewrites ICO files")
        .subcommand(
            SubCommand::with_name("create")
                .about("Creates an ICO file from PNG files")
                .arg(
                    Arg::with_name("output")
                        .takes_value(true)
                        .value_name("PATH")
                        .short("o")
                        .long("output")
                        .help("Sets output path"),
                )
                .arg(Arg::with_name("image").multiple(true)),
        )
        .subcommand(
            SubCommand::with_name("extract")
                .about("Extracts one image from an ICO file as a PNG or BMP")
                .arg(
                    Arg::with_name("output")
                        .takes_value(true)
                        .value_name("PATH")
                        .short("o")
                        .long("output")
                        .help("Sets output path"),
                )
                .arg(Arg::with_name("ico").required(true))
                .arg(Arg::with_name("index").required(true)),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("Lists images in an ICO file")
                .arg(Arg::with_name("ico").required(true)),
        )
        .subcommand(
            SubCommand::with_name("convert")
                .about("Rewrites an ICO file with every image stored as PNG")
                .arg(Arg::with_name("ico").required(true))
                .arg(Arg::with_name("output").required(true)),
        )
        .get_matches();
    let codec = icoedit::PngCodec::new();
    if let Some(submatches) = matches.subcommand_matches("create") {
        let out_path = if let Some(path) = submatches.value_of("output") {
            PathBuf::from(path)
        } else {
            let mut path = PathBuf::from("out.ico");
            let mut index: i32 = 0;
            while path.exists() {
                index += 1;
                path = PathBuf::from(format!("out{}.ico", index));
            }
            path
        };
        let mut images = Vec::new();
        if let Some(paths) = submatches.values_of("image") {
            for path in paths {
                println!("Adding {:?}", path);
                let data = fs::read(path).unwrap();
                images.push((data, icoedit::PNG_MEDIA_TYPE.to_string()));
            }
        }
        let mut icondir = icoedit::IconDir::new();
        icondir.add_encoded_images(images, &codec).unwrap();
        for (index, entry) in icondir.entries().iter().enumerate() {
            if let Some(error) = entry.error() {
                println!("Skipping image {}: {}", index, error);
            }
        }
        let out_file = fs::File::create(out_path).unwrap();
        icondir.write(out_file, &codec).unwrap();
    } else if let Some(submatches) = matches.subcommand_matches("extract") {
        let path = submatches.value_of("ico").unwrap();
        let file = fs::File::open(path).unwrap();
        let icondir = icoedit::IconDir::read(file).unwrap();
        let index = submatches.value_of("index").unwrap();
        let index = index.parse::<usize>().unwrap();
        let entry = &icondir.entries()[index];
        let out_path = if let Some(path) = submatches.value_of("output") {
            PathBuf::from(path)
        } else {
            let extension = if entry.is_png() { "png" } else { "bmp" };
            PathBuf::from(format!("{}.{}.{}", path, index, extension))
        };
        fs::write(out_path, entry.standalone_file_bytes().unwrap()).unwrap();
    } else if let Some(submatches) = matches.subcommand_matches("list") {
        let path = submatches.value_of("ico").unwrap();
        let file = fs::File::open(path).unwrap();
        let icondir = icoedit::IconDir::read(file).unwrap();
        if let Some(error) = icondir.error() {
            println!("Error: {}", error);
        }
        for (index, entry) in icondir.entries().iter().enumerate() {
            let kind = if entry.is_png() { "PNG" } else { "BMP" };
            let suffix = match entry.error() {
                Some(error) => format!("error: {}", error),
                None => format!("{} bpp", entry.bits_per_pixel()),
            };
            println!(
                "{:5}: {}x{} {}, {}",
                index,
                entry.width(),
                entry.height(),
                kind,
                suffix
            );
        }
    } else if let Some(submatches) = matches.subcommand_matches("convert") {
        let path = submatches.value_of("ico").unwrap();
        let file = fs::File::open(path).unwrap();
        let icondir = icoedit::IconDir::read(file).unwrap();
        let out_file =
            fs::File::create(submatches.value_of("output").unwrap()).unwrap();
        icondir.write(out_file, &codec).unwrap();
    }
}

//===========================================================================//
