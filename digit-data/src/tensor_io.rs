use crate::common_io::{mkdir, write_lines};

use candle_vae::candle_core::{Device, Tensor};

///
/// Write a 2D tensor as a delimited table
///
/// * `tensor` - any 2D tensor; other ranks are flattened from axis 1
/// * `file` - output file--either gzipped or not
/// * `header` - optional column names
/// * `row_names` - optional first column, one entry per row
///
pub fn write_tensor_delim(
    tensor: &Tensor,
    file: &str,
    delim: &str,
    header: Option<&[Box<str>]>,
    row_names: Option<&[Box<str>]>,
) -> anyhow::Result<()> {
    let rows = tensor
        .flatten_from(1)?
        .to_device(&Device::Cpu)?
        .to_vec2::<f32>()?;

    if let Some(names) = row_names {
        if names.len() != rows.len() {
            return Err(anyhow::anyhow!(
                "{} row names for {} rows",
                names.len(),
                rows.len()
            ));
        }
    }

    let mut lines: Vec<Box<str>> = Vec::with_capacity(rows.len() + 1);

    if let Some(header) = header {
        lines.push(header.join(delim).into_boxed_str());
    }

    for (i, row) in rows.iter().enumerate() {
        let values = row
            .iter()
            .map(|x| format!("{}", x))
            .collect::<Vec<_>>()
            .join(delim);
        let line = match row_names {
            Some(names) => format!("{}{}{}", names[i], delim, values),
            None => values,
        };
        lines.push(line.into_boxed_str());
    }

    mkdir(file)?;
    write_lines(&lines, file)
}

/// Tab-separated [`write_tensor_delim`]
pub fn write_tensor_tsv(
    tensor: &Tensor,
    file: &str,
    header: Option<&[Box<str>]>,
    row_names: Option<&[Box<str>]>,
) -> anyhow::Result<()> {
    write_tensor_delim(tensor, file, "\t", header, row_names)
}
