use approx::assert_abs_diff_eq;
use candle_vae::candle_core::{Device, Tensor};
use candle_vae::candle_vae_config::ImageShape;
use digit_data::common_io::{read_delim_table, write_lines};
use digit_data::digit_csv::{DigitTable, UNLABELED};
use digit_data::holdout::split_table;
use digit_data::tensor_io::write_tensor_tsv;

fn tiny_shape() -> ImageShape {
    ImageShape::new(2, 2, 1)
}

/// Path of `name` inside `dir`; the directory goes away with `dir`
fn temp_file(dir: &tempfile::TempDir, name: &str) -> anyhow::Result<String> {
    let path = dir.path().join(name);
    Ok(path.to_str().ok_or(anyhow::anyhow!("path"))?.to_string())
}

fn write_csv(dir: &tempfile::TempDir, name: &str, lines: &[&str]) -> anyhow::Result<String> {
    let file = temp_file(dir, name)?;
    let lines: Vec<Box<str>> = lines.iter().map(|&x| x.into()).collect();
    write_lines(&lines, &file)?;
    Ok(file)
}

#[test]
fn labeled_csv_strips_label() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = write_csv(
        &dir,
        "labeled.csv",
        &[
            "label,pixel0,pixel1,pixel2,pixel3",
            "3,0,255,0,255",
            "7,255,255,0,0",
        ],
    )?;

    let table = DigitTable::read_csv(&file, &tiny_shape())?;
    assert_eq!(table.labels, vec![3, 7]);
    assert_eq!(table.nrows(), 2);
    assert_eq!(table.ncols(), 4);
    assert_eq!(table.pixels[(1, 1)], 255.);

    let x = table.to_image_tensor(&tiny_shape(), &Device::Cpu)?;
    assert_eq!(x.dims(), &[2, 1, 2, 2]);
    assert_eq!(
        x.flatten_from(1)?.to_vec2::<f32>()?,
        vec![vec![0., 1., 0., 1.], vec![1., 1., 0., 0.]]
    );
    Ok(())
}

#[test]
fn gzipped_unlabeled_csv() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = write_csv(
        &dir,
        "unlabeled.csv.gz",
        &["pixel0,pixel1,pixel2,pixel3", "0,1,2,3", "# comment", "4,5,6,7"],
    )?;

    let table = DigitTable::read_csv(&file, &tiny_shape())?;
    assert_eq!(table.labels, vec![UNLABELED, UNLABELED]);
    assert!(table.labeled_rows().is_empty());
    assert_eq!(table.pixels[(1, 3)], 7.);
    Ok(())
}

#[test]
fn wrong_row_width_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = write_csv(&dir, "narrow.csv", &["label,a,b,c", "1,0,0,0"])?;
    assert!(DigitTable::read_csv(&file, &tiny_shape()).is_err());

    let file = write_csv(&dir, "bright.csv", &["a,b,c,d", "0,0,0,256"])?;
    assert!(DigitTable::read_csv(&file, &tiny_shape()).is_err());

    let file = write_csv(&dir, "text.csv", &["a,b,c,d", "0,x,0,0"])?;
    assert!(DigitTable::read_csv(&file, &tiny_shape()).is_err());
    Ok(())
}

#[test]
fn channels_last_rows_become_channels_first() -> anyhow::Result<()> {
    let shape = ImageShape::new(2, 2, 2);
    // (h, w, c) order: pixel (0,0) = (0, 255), ...
    let dir = tempfile::tempdir()?;
    let file = write_csv(
        &dir,
        "two_channels.csv",
        &["p0,p1,p2,p3,p4,p5,p6,p7", "0,255,0,255,0,255,0,255"],
    )?;
    let table = DigitTable::read_csv(&file, &shape)?;
    let x = table.to_image_tensor(&shape, &Device::Cpu)?;
    assert_eq!(x.dims(), &[1, 2, 2, 2]);
    let v = x.flatten_all()?.to_vec1::<f32>()?;
    assert_eq!(v, vec![0., 0., 0., 0., 1., 1., 1., 1.]);
    Ok(())
}

#[test]
fn combine_and_hold_out() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let train = write_csv(&dir, "train.csv", &["label,a,b,c,d", "1,0,0,0,0", "2,1,1,1,1"])?;
    let test = write_csv(&dir, "test.csv", &["a,b,c,d", "2,2,2,2", "3,3,3,3"])?;

    let combined = DigitTable::concat(vec![
        DigitTable::read_csv(&train, &tiny_shape())?,
        DigitTable::read_csv(&test, &tiny_shape())?,
    ])?;
    assert_eq!(combined.labels, vec![1, 2, UNLABELED, UNLABELED]);
    assert_eq!(combined.labeled_rows(), vec![0, 1]);
    assert_eq!(combined.pixels[(3, 0)], 3.);

    let split = split_table(&combined, 2, 555);
    assert_eq!(split.train.nrows(), 2);
    assert_eq!(split.valid.nrows(), 2);

    let total: f32 = split.train.pixels.sum() + split.valid.pixels.sum();
    assert_abs_diff_eq!(total, combined.pixels.sum());
    Ok(())
}

#[test]
fn tensor_tsv_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = &temp_file(&dir, "latent.tsv.gz")?;

    let x = Tensor::new(&[[0.5f32, -1.], [2., 3.25]], &Device::Cpu)?;
    let header: Vec<Box<str>> = vec!["name".into(), "z1".into(), "z2".into()];
    let rows: Vec<Box<str>> = vec!["0".into(), "1".into()];
    write_tensor_tsv(&x, file, Some(&header), Some(&rows))?;

    let table = read_delim_table(file, '\t', |s| Ok(s.parse::<f32>()?))?;
    assert_eq!(table.header, header);
    assert_eq!(table.lines, vec![vec![0., 0.5, -1.], vec![1., 2., 3.25]]);
    Ok(())
}

