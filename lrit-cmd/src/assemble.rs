use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use lrit::{
    collector::{FinishedImage, ImageCollector},
    file::LritFile,
    product::ProductMeta,
};
use rayon::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub struct Opts {
    /// Channels to assemble. Empty for all channels.
    pub channels: Vec<u8>,
    pub emit_partial: bool,
    pub satellite_name: String,
    pub satellite_short_name: String,
    pub clobber: bool,
}

#[derive(Serialize)]
struct Sidecar<'a> {
    id: &'a str,
    complete: bool,
    missing_segments: &'a [usize],
    lines: usize,
    columns: usize,
    meta: &'a ProductMeta,
}

fn read_file(path: &Path) -> Result<LritFile> {
    let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
    LritFile::read(std::io::BufReader::new(file)).with_context(|| format!("decoding {path:?}"))
}

pub fn assemble(inputs: &[PathBuf], output: &Path, opts: &Opts) -> Result<()> {
    std::fs::create_dir_all(output).with_context(|| format!("creating {output:?}"))?;

    // Decoding is independent per file; assembly is done in input order.
    let files: Vec<(&PathBuf, Result<LritFile>)> =
        inputs.par_iter().map(|p| (p, read_file(p))).collect();

    let mut collector = ImageCollector::builder()
        .satellite_name(opts.satellite_name.as_str())
        .satellite_short_name(opts.satellite_short_name.as_str())
        .emit_partial(opts.emit_partial)
        .build();

    let mut written = 0;
    let mut partial = 0;
    for (path, zult) in files {
        let file = match zult {
            Ok(file) => file,
            Err(err) => {
                warn!("skipping {path:?}: {err:#}");
                continue;
            }
        };
        if let Some(segment) = file.segment {
            if !opts.channels.is_empty() && !opts.channels.contains(&segment.channel) {
                debug!("skipping {path:?}: channel {} not selected", segment.channel);
                continue;
            }
        }
        let images = match collector.push(file) {
            Ok(images) => images,
            Err(err) => {
                warn!("skipping {path:?}: {err}");
                continue;
            }
        };
        for image in images {
            partial += usize::from(!image.complete);
            write_image(&image, output, opts.clobber)?;
            written += 1;
        }
    }

    for image in collector.flush() {
        partial += usize::from(!image.complete);
        write_image(&image, output, opts.clobber)?;
        written += 1;
    }

    info!("wrote {written} images ({partial} partial) to {output:?}");
    Ok(())
}

fn write_image(image: &FinishedImage, dir: &Path, clobber: bool) -> Result<()> {
    let stem = if image.complete {
        image.id.clone()
    } else {
        format!("{}_partial", image.id)
    };
    let png_path = dir.join(format!("{stem}.png"));
    let json_path = dir.join(format!("{stem}.json"));
    for path in [&png_path, &json_path] {
        if !clobber && path.exists() {
            bail!("{path:?} exists; use --clobber");
        }
    }

    let (lines, columns) = image.image.dim();
    let raster = image.image.as_standard_layout();
    let raster = raster
        .as_slice()
        .context("image raster is not contiguous")?;

    let mut tmp = NamedTempFile::new_in(dir).context("creating temp file")?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        PngEncoder::new(&mut writer)
            .write_image(
                raster,
                u32::try_from(columns).context("image too wide")?,
                u32::try_from(lines).context("image too tall")?,
                ExtendedColorType::L8,
            )
            .with_context(|| format!("encoding {png_path:?}"))?;
        writer.flush().context("writing png")?;
    }
    tmp.persist(&png_path)
        .with_context(|| format!("persisting {png_path:?}"))?;

    let sidecar = Sidecar {
        id: &image.id,
        complete: image.complete,
        missing_segments: &image.missing,
        lines,
        columns,
        meta: &image.meta,
    };
    let mut tmp = NamedTempFile::new_in(dir).context("creating temp file")?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), &sidecar).context("serializing metadata")?;
    tmp.persist(&json_path)
        .with_context(|| format!("persisting {json_path:?}"))?;

    info!(
        "wrote {png_path:?} ({columns}x{lines}, complete={})",
        image.complete
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use ndarray::Array2;

    use super::*;
    use crate::segment_fixtures::SegmentFile;

    fn finished(complete: bool) -> FinishedImage {
        FinishedImage {
            id: "19_1_20240101T000000".to_string(),
            meta: ProductMeta::builder().channel(1).build(),
            image: Array2::from_elem((6, 4), 0x80),
            complete,
            missing: if complete { vec![] } else { vec![2] },
        }
    }

    #[test]
    fn writes_png_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&finished(true), dir.path(), false).unwrap();

        let png = std::fs::read(dir.path().join("19_1_20240101T000000.png")).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let json: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("19_1_20240101T000000.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["lines"], 6);
        assert_eq!(json["columns"], 4);
        assert_eq!(json["meta"]["channel"], 1);
    }

    #[test]
    fn partial_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&finished(false), dir.path(), false).unwrap();
        assert!(dir.path().join("19_1_20240101T000000_partial.png").exists());
    }

    #[test]
    fn no_clobber() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&finished(true), dir.path(), false).unwrap();
        assert!(write_image(&finished(true), dir.path(), false).is_err());
        write_image(&finished(true), dir.path(), true).unwrap();
    }

    fn write_inputs(dir: &Path) -> Vec<PathBuf> {
        let mut inputs = Vec::default();
        let mut add = |name: &str, dat: Vec<u8>| {
            let path = dir.join(name);
            std::fs::write(&path, dat).unwrap();
            inputs.push(path);
        };

        add("L_1_002.lrit", SegmentFile::new(1, 2, 2).bytes());
        add("L_2_001.lrit", SegmentFile::new(2, 1, 2).bytes());
        add("garbage.lrit", b"not an lrit file".to_vec());
        add("L_3_001.lrit", SegmentFile::new(3, 1, 2).bytes());
        // primary header claiming an enormous data field that is not there
        let mut huge = vec![0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x10];
        huge.extend(u64::MAX.to_be_bytes());
        add("huge.lrit", huge);
        add("L_1_001.lrit", SegmentFile::new(1, 1, 2).bytes());
        add("L_3_002.lrit", SegmentFile::new(3, 2, 2).bytes());

        inputs
    }

    fn output_names(dir: &Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    fn opts(channels: Vec<u8>, emit_partial: bool) -> Opts {
        Opts {
            channels,
            emit_partial,
            satellite_name: "Elektro-L 3".to_string(),
            satellite_short_name: "L3".to_string(),
            clobber: false,
        }
    }

    #[test]
    fn assemble_selected_channels() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path());
        let output = dir.path().join("out");

        assemble(&inputs, &output, &opts(vec![1, 2], true)).unwrap();

        let expected: BTreeSet<String> = [
            "19_1_20240101T000000.json",
            "19_1_20240101T000000.png",
            "19_2_20240101T000000_partial.json",
            "19_2_20240101T000000_partial.png",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(output_names(&output), expected);

        let json: serde_json::Value = serde_json::from_slice(
            &std::fs::read(output.join("19_2_20240101T000000_partial.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["complete"], false);
        assert_eq!(json["missing_segments"], serde_json::json!([1]));
        assert_eq!(json["meta"]["satellite_name"], "Elektro-L 3");
    }

    #[test]
    fn assemble_without_partial() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path());
        let output = dir.path().join("out");

        assemble(&inputs, &output, &opts(Vec::default(), false)).unwrap();

        let expected: BTreeSet<String> = [
            "19_1_20240101T000000.json",
            "19_1_20240101T000000.png",
            "19_3_20240101T000000.json",
            "19_3_20240101T000000.png",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(output_names(&output), expected);
    }
}
