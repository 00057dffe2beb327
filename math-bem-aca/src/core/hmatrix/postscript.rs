//! PostScript dump of the block structure
//!
//! Draws the matrix in clustered index order: low-rank leaves in green with
//! their rank, dense leaves in red. Mirrored blocks of a symmetric matrix are
//! drawn in a lighter shade.

use super::operator::HMatrix;
use crate::core::error::Result;
use math_audio_linalg::{ComplexField, LinearOperator};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Page extent in points
const PAGE_SIZE: f64 = 500.0;
const MARGIN: f64 = 50.0;

/// Write the block structure of `matrix` to `path`
pub fn write_postscript<T: ComplexField, P: AsRef<Path>>(
    matrix: &HMatrix<T>,
    path: P,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut out = BufWriter::new(file);
    write_blocks(matrix, &mut out)?;
    out.flush()?;
    log::info!("block structure written to {}", path.as_ref().display());
    Ok(())
}

fn write_blocks<T: ComplexField, W: Write>(matrix: &HMatrix<T>, out: &mut W) -> Result<()> {
    let rows = matrix.num_rows().max(1) as f64;
    let cols = matrix.num_cols().max(1) as f64;
    let scale = PAGE_SIZE / rows.max(cols);
    let height = rows * scale;

    writeln!(out, "%!PS-Adobe-3.0 EPSF-3.0")?;
    writeln!(
        out,
        "%%BoundingBox: 0 0 {} {}",
        (cols * scale + 2.0 * MARGIN).ceil(),
        (height + 2.0 * MARGIN).ceil()
    )?;
    writeln!(out, "%%Title: H-matrix block structure")?;
    writeln!(out, "%%EndComments")?;
    writeln!(out, "/Helvetica findfont 8 scalefont setfont")?;
    writeln!(
        out,
        "/blk {{ /h exch def /w exch def /y exch def /x exch def setrgbcolor \
         newpath x y moveto w 0 rlineto 0 h rlineto w neg 0 rlineto closepath \
         gsave fill grestore 0 setgray 0.2 setlinewidth stroke }} def"
    )?;

    // row 0 at the top of the page
    let rect = |out: &mut W,
                r0: usize,
                c0: usize,
                nr: usize,
                nc: usize,
                rgb: (f64, f64, f64),
                label: Option<usize>|
     -> Result<()> {
        let x = MARGIN + c0 as f64 * scale;
        let w = nc as f64 * scale;
        let h = nr as f64 * scale;
        let y = MARGIN + height - r0 as f64 * scale - h;
        writeln!(
            out,
            "{:.3} {:.3} {:.3} {:.3} {:.3} {:.3} {:.3} blk",
            rgb.0, rgb.1, rgb.2, x, y, w, h
        )?;
        if let Some(rank) = label {
            if w > 12.0 && h > 10.0 {
                writeln!(
                    out,
                    "0 setgray {:.3} {:.3} moveto ({}) show",
                    x + 0.5 * w - 3.0,
                    y + 0.5 * h - 3.0,
                    rank
                )?;
            }
        }
        Ok(())
    };

    for (node, payload) in matrix.leaf_blocks() {
        let (rgb, mirror_rgb) = match payload.rank() {
            Some(_) => ((0.45, 0.8, 0.45), (0.75, 0.92, 0.75)),
            None => ((0.9, 0.3, 0.3), (0.97, 0.7, 0.7)),
        };
        rect(
            out,
            node.rows.start,
            node.cols.start,
            node.num_rows(),
            node.num_cols(),
            rgb,
            payload.rank(),
        )?;
        if matrix.is_symmetric() && !node.is_diagonal() {
            rect(
                out,
                node.cols.start,
                node.rows.start,
                node.num_cols(),
                node.num_rows(),
                mirror_rgb,
                payload.rank(),
            )?;
        }
    }

    writeln!(out, "showpage")?;
    writeln!(out, "%%EOF")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hmatrix::block_tree::{BlockClusterTree, BlockTreeOptions};
    use crate::core::hmatrix::blocks::{BlockData, LowRankBlock};
    use crate::core::hmatrix::cluster::ClusterTree;
    use ndarray::Array2;
    use std::sync::Arc;

    #[test]
    fn test_postscript_lists_every_leaf() {
        let points: Vec<_> = (0..64).map(|i| [i as f64, 0.0, 0.0]).collect();
        let tree = Arc::new(ClusterTree::build(&points, 8).unwrap());
        let options = BlockTreeOptions {
            eta: 1.0,
            minimum_block_size: 8,
            maximum_block_size: usize::MAX,
        };
        let blocks = BlockClusterTree::build(&tree, &tree, &options, false).unwrap();
        let payloads = blocks
            .leaves()
            .iter()
            .map(|&l| {
                let node = blocks.node(l);
                if node.kind.is_admissible() {
                    BlockData::LowRank(LowRankBlock::zero(node.num_rows(), node.num_cols()))
                } else {
                    BlockData::Dense(Array2::<f64>::zeros((node.num_rows(), node.num_cols())))
                }
            })
            .collect();
        let leaf_count = blocks.leaf_count();
        let h = HMatrix::new(tree.clone(), tree, blocks, payloads).unwrap();

        let mut buffer = Vec::new();
        write_blocks(&h, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("%!PS"));
        assert_eq!(text.matches(" blk\n").count(), leaf_count);
        assert!(text.trim_end().ends_with("%%EOF"));
    }
}
