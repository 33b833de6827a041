//! Uncompressed pixel data
//!
//! Image data is stored as `NBPR` x `NBPC` blocks of `NPPBH` x `NPPBV` pixels, with band
//! samples interleaved according to `IMODE` and packed MSB first at `NBPP` bits each. Blocks
//! on the right and bottom edges may carry padding pixels, which are dropped here.

use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use tracing::debug;

use crate::{
    dialect::{Dialect, SegmentKind},
    security::SecurityMetadata,
    segment::{
        image::{
            ImageBand, ImageCategory, ImageCompression, ImageMode, ImageRepresentation,
            ImageSegment, PixelJustification, PixelValueType,
        },
        SegmentData,
    },
    serde::BitReader,
    Error,
};

/// Largest block edge that must be written explicitly; larger images use a single block
const MAX_BLOCK_EDGE: u32 = 8192;

/// Unpacked samples of an image, pixel interleaved, one `u32` per sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    bands: usize,
    samples: Vec<u32>,
}

impl Raster {
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub const fn bands(&self) -> usize {
        self.bands
    }

    /// Sample of `band` at column `x`, row `y`
    #[must_use]
    pub fn sample(&self, x: usize, y: usize, band: usize) -> Option<u32> {
        if x >= self.width || y >= self.height || band >= self.bands {
            return None;
        }
        self.samples.get((y * self.width + x) * self.bands + band).copied()
    }

    /// All samples, row by row, bands of a pixel adjacent
    #[must_use]
    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    fn pixels(&self) -> impl Iterator<Item = &[u32]> {
        self.samples.chunks_exact(self.bands)
    }
}

struct Unpacker<'a> {
    bits: BitReader<'a>,
    bits_per_pixel: u8,
    shift: u8,
    mask: u32,
    block_width: usize,
    block_height: usize,
    raster: Raster,
}

impl Unpacker<'_> {
    fn next(
        &mut self,
        block: (usize, usize),
        x: usize,
        y: usize,
        band: usize,
    ) -> Result<(), Error> {
        let raw = self.bits.read_bits(self.bits_per_pixel).ok_or_else(|| {
            Error::UnsupportedImage(format!(
                "image data ends at bit {}",
                self.bits.bit_position()
            ))
        })?;
        let x = block.1 * self.block_width + x;
        let y = block.0 * self.block_height + y;
        let raster = &mut self.raster;
        if x < raster.width && y < raster.height {
            raster.samples[(y * raster.width + x) * raster.bands + band] =
                (raw >> self.shift) & self.mask;
        }
        Ok(())
    }
}

impl ImageSegment {
    /// Unpacks uncompressed pixel data
    ///
    /// # Errors
    ///
    /// - [`Error::Build`] if the data is deferred
    /// - [`Error::UnsupportedImage`] for compressed data, sample depths above 32 bits, or data
    ///   shorter than the blocks it must fill
    pub fn raster(&self) -> Result<Raster, Error> {
        let data = self.data.require_loaded(SegmentKind::Image)?;
        if self.compression != ImageCompression::Uncompressed {
            return Err(Error::UnsupportedImage(format!(
                "{} compressed data",
                self.compression
            )));
        }
        let nbpp = self.bits_per_pixel;
        if !(1..=32).contains(&nbpp) {
            return Err(Error::UnsupportedImage(format!("{nbpp} bits per sample")));
        }
        let abpp = self.actual_bits_per_pixel.clamp(1, nbpp);
        let bands = self.band_count();
        let width = self.columns as usize;
        let height = self.rows as usize;
        let block_width = match self.pixels_per_block_horizontal {
            0 => width,
            n => usize::from(n),
        };
        let block_height = match self.pixels_per_block_vertical {
            0 => height,
            n => usize::from(n),
        };
        let (per_row, per_column) = (
            usize::from(self.blocks_per_row),
            usize::from(self.blocks_per_column),
        );
        if bands == 0
            || per_row.saturating_mul(block_width) < width
            || per_column.saturating_mul(block_height) < height
        {
            return Err(Error::UnsupportedImage(format!(
                "{per_row}x{per_column} blocks of {block_width}x{block_height} pixels do not \
                 cover {width}x{height} pixels"
            )));
        }
        let required_bits = [
            per_row,
            per_column,
            block_width,
            block_height,
            bands,
            usize::from(nbpp),
        ]
        .into_iter()
        .try_fold(1usize, usize::checked_mul);
        match required_bits {
            Some(bits) if bits <= data.len().saturating_mul(8) => {}
            _ => {
                return Err(Error::UnsupportedImage(format!(
                    "{} bytes of data are too short for {per_row}x{per_column} blocks of \
                     {block_width}x{block_height} pixels, {bands} bands of {nbpp} bits",
                    data.len()
                )))
            }
        }

        let mut unpacker = Unpacker {
            bits: BitReader::new(data),
            bits_per_pixel: nbpp,
            shift: match self.justification {
                PixelJustification::Left => nbpp - abpp,
                PixelJustification::Right => 0,
            },
            mask: u32::MAX >> (32 - u32::from(abpp)),
            block_width,
            block_height,
            raster: Raster {
                width,
                height,
                bands,
                samples: vec![0; width * height * bands],
            },
        };
        let blocks: Vec<(usize, usize)> = (0..per_column)
            .flat_map(|row| (0..per_row).map(move |column| (row, column)))
            .collect();
        debug!(
            "unpacking {} blocks, {} bands, mode {}",
            blocks.len(),
            bands,
            self.mode
        );

        match self.mode {
            ImageMode::BlockInterleaved => {
                for &block in &blocks {
                    for band in 0..bands {
                        unpack_plane(&mut unpacker, block, band)?;
                    }
                }
            }
            ImageMode::Sequential => {
                for band in 0..bands {
                    for &block in &blocks {
                        unpack_plane(&mut unpacker, block, band)?;
                    }
                }
            }
            ImageMode::PixelInterleaved => {
                for &block in &blocks {
                    for y in 0..block_height {
                        for x in 0..block_width {
                            for band in 0..bands {
                                unpacker.next(block, x, y, band)?;
                            }
                        }
                    }
                    unpacker.bits.align();
                }
            }
            ImageMode::RowInterleaved => {
                for &block in &blocks {
                    for y in 0..block_height {
                        for band in 0..bands {
                            for x in 0..block_width {
                                unpacker.next(block, x, y, band)?;
                            }
                        }
                    }
                    unpacker.bits.align();
                }
            }
        }
        Ok(unpacker.raster)
    }

    /// Converts displayable 8 and 16 bit images to an [`image::DynamicImage`]
    ///
    /// Supported are single band images (with an optional grey or colour lookup table) and
    /// three band `RGB` images.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnsupportedImage`] for other representations, or if a sample
    /// indexes past the end of its lookup table.
    pub fn to_dynamic_image(&self) -> Result<DynamicImage, Error> {
        let raster = self.raster()?;
        let (width, height) = (self.columns, self.rows);
        let bilevel = self.pixel_value_type == PixelValueType::Bilevel || self.bits_per_pixel == 1;
        let abpp = self.actual_bits_per_pixel;
        let luts = self.bands.first().map_or(&[][..], |band| band.luts.as_slice());
        let unsupported = || {
            Error::UnsupportedImage(format!(
                "{} image with {} bands of {abpp} bits",
                self.representation,
                raster.bands()
            ))
        };

        let image = match (raster.bands(), luts.len()) {
            (1, 3) => {
                let mut rgb = Vec::with_capacity(raster.samples().len() * 3);
                for &index in raster.samples() {
                    for lut in luts {
                        rgb.push(lookup(lut, index)?);
                    }
                }
                RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
            }
            (1, 1) => {
                let grey = raster
                    .samples()
                    .iter()
                    .map(|&index| lookup(&luts[0], index))
                    .collect::<Result<Vec<_>, _>>()?;
                GrayImage::from_raw(width, height, grey).map(DynamicImage::ImageLuma8)
            }
            (1, 0) if bilevel => {
                let grey = raster
                    .samples()
                    .iter()
                    .map(|&v| if v == 0 { 0 } else { u8::MAX })
                    .collect();
                GrayImage::from_raw(width, height, grey).map(DynamicImage::ImageLuma8)
            }
            (1, 0) if abpp <= 8 => {
                let grey = raster.samples().iter().map(|&v| v as u8).collect();
                GrayImage::from_raw(width, height, grey).map(DynamicImage::ImageLuma8)
            }
            (1, 0) if abpp <= 16 => {
                let grey = raster.samples().iter().map(|&v| v as u16).collect();
                ImageBuffer::<Luma<u16>, _>::from_raw(width, height, grey)
                    .map(DynamicImage::ImageLuma16)
            }
            (3, 0) if self.representation == ImageRepresentation::Rgb && abpp <= 8 => {
                let rgb = raster.pixels().flatten().map(|&v| v as u8).collect();
                RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
            }
            (3, 0) if self.representation == ImageRepresentation::Rgb && abpp <= 16 => {
                let rgb = raster.pixels().flatten().map(|&v| v as u16).collect();
                ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, rgb)
                    .map(DynamicImage::ImageRgb16)
            }
            _ => return Err(unsupported()),
        };
        image.ok_or_else(unsupported)
    }

    /// Builds an uncompressed, unclassified image segment from an [`image::DynamicImage`]
    ///
    /// Grey images become single band `MONO` segments, everything else is converted to `RGB`.
    /// 16 bit images keep their depth.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Build`] for an empty image
    pub fn from_dynamic_image(img: &DynamicImage, dialect: Dialect) -> Result<Self, Error> {
        let (columns, rows) = img.dimensions();
        if columns == 0 || rows == 0 {
            return Err(Error::Build("cannot store an empty image".to_owned()));
        }
        let (representation, band_names, bits, data): (_, &[&str], u8, Vec<u8>) = match img {
            DynamicImage::ImageLuma8(grey) => {
                (ImageRepresentation::Monochrome, &["M"], 8, grey.as_raw().clone())
            }
            DynamicImage::ImageLuma16(grey) => (
                ImageRepresentation::Monochrome,
                &["M"],
                16,
                grey.as_raw().iter().flat_map(|v| v.to_be_bytes()).collect(),
            ),
            DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => (
                ImageRepresentation::Rgb,
                &["R", "G", "B"],
                16,
                img.to_rgb16()
                    .as_raw()
                    .iter()
                    .flat_map(|v| v.to_be_bytes())
                    .collect(),
            ),
            _ => (
                ImageRepresentation::Rgb,
                &["R", "G", "B"],
                8,
                img.to_rgb8().into_raw(),
            ),
        };
        let bands = band_names
            .iter()
            .map(|name| ImageBand::builder().representation(*name).build())
            .collect::<Vec<_>>();
        let mode = if bands.len() == 1 {
            ImageMode::BlockInterleaved
        } else {
            ImageMode::PixelInterleaved
        };

        Ok(Self::builder()
            .security(SecurityMetadata::unclassified(dialect))
            .rows(rows)
            .columns(columns)
            .representation(representation)
            .category(ImageCategory::Visible)
            .actual_bits_per_pixel(bits)
            .bits_per_pixel(bits)
            .bands(bands)
            .mode(mode)
            .pixels_per_block_horizontal(block_edge(columns))
            .pixels_per_block_vertical(block_edge(rows))
            .data(SegmentData::Loaded(data))
            .build())
    }
}

fn unpack_plane(
    unpacker: &mut Unpacker<'_>,
    block: (usize, usize),
    band: usize,
) -> Result<(), Error> {
    for y in 0..unpacker.block_height {
        for x in 0..unpacker.block_width {
            unpacker.next(block, x, y, band)?;
        }
    }
    unpacker.bits.align();
    Ok(())
}

fn lookup(lut: &[u8], index: u32) -> Result<u8, Error> {
    usize::try_from(index)
        .ok()
        .and_then(|i| lut.get(i))
        .copied()
        .ok_or_else(|| {
            Error::UnsupportedImage(format!(
                "sample {index} outside a lookup table of {} entries",
                lut.len()
            ))
        })
}

/// `NPPBH`/`NPPBV` for a single block covering `edge` pixels
fn block_edge(edge: u32) -> u16 {
    if edge > MAX_BLOCK_EDGE {
        0
    } else {
        edge as u16
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, GenericImageView, GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    fn segment(bands: usize, mode: ImageMode, data: Vec<u8>) -> ImageSegment {
        ImageSegment::builder()
            .rows(2)
            .columns(3)
            .actual_bits_per_pixel(8)
            .bits_per_pixel(8)
            .pixels_per_block_horizontal(3)
            .pixels_per_block_vertical(2)
            .representation(if bands == 3 {
                ImageRepresentation::Rgb
            } else {
                ImageRepresentation::Monochrome
            })
            .bands(vec![ImageBand::builder().build(); bands])
            .mode(mode)
            .data(SegmentData::Loaded(data))
            .build()
    }

    #[test]
    fn interleave_modes_agree() {
        // two bands, pixel values band * 100 + pixel index
        let by_pixel: Vec<u8> = (0..6).flat_map(|p| [p, 100 + p]).collect();
        let by_band: Vec<u8> = (0..6).chain(100..106).collect();
        let by_row: Vec<u8> = [0, 1, 2, 100, 101, 102, 3, 4, 5, 103, 104, 105].to_vec();

        let expected = segment(2, ImageMode::PixelInterleaved, by_pixel).raster().unwrap();
        assert_eq!(expected.sample(2, 1, 1), Some(105));
        for (mode, data) in [
            (ImageMode::BlockInterleaved, by_band.clone()),
            (ImageMode::Sequential, by_band),
            (ImageMode::RowInterleaved, by_row),
        ] {
            assert_eq!(segment(2, mode, data).raster().unwrap(), expected, "{mode}");
        }
    }

    #[test]
    fn padding_pixels_are_dropped() {
        let mut seg = segment(1, ImageMode::BlockInterleaved, (0..8).collect());
        // 2x2 blocks, 2 per row and 1 per column: columns 3 and the padding column
        seg.pixels_per_block_horizontal = 2;
        seg.blocks_per_row = 2;
        let raster = seg.raster().unwrap();
        assert_eq!(raster.samples(), &[0, 1, 4, 2, 3, 6]);
    }

    #[test]
    fn sub_byte_samples_are_justified() {
        let mut seg = segment(1, ImageMode::BlockInterleaved, vec![0b1010_0110, 0b1100_0000]);
        seg.bits_per_pixel = 2;
        seg.actual_bits_per_pixel = 1;
        seg.justification = PixelJustification::Left;
        let raster = seg.raster().unwrap();
        assert_eq!(raster.samples(), &[1, 1, 0, 1, 1, 0]);

        seg.justification = PixelJustification::Right;
        assert_eq!(seg.raster().unwrap().samples(), &[0, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn short_or_compressed_data_is_refused() {
        let seg = segment(1, ImageMode::BlockInterleaved, vec![0; 5]);
        assert!(matches!(seg.raster(), Err(Error::UnsupportedImage(_))));

        let mut seg = segment(1, ImageMode::BlockInterleaved, vec![0; 6]);
        seg.compression = ImageCompression::Jpeg;
        assert!(matches!(seg.raster(), Err(Error::UnsupportedImage(_))));

        seg.compression = ImageCompression::Uncompressed;
        seg.data = SegmentData::Deferred {
            offset: 0,
            length: 6,
        };
        assert!(matches!(seg.raster(), Err(Error::Build(_))));
    }

    #[test]
    fn implausible_dimensions_are_refused_before_unpacking() {
        let mut seg = segment(1, ImageMode::BlockInterleaved, vec![0; 16]);
        seg.rows = 99_999_999;
        seg.columns = 99_999_999;
        seg.pixels_per_block_horizontal = 0;
        seg.pixels_per_block_vertical = 0;
        assert!(matches!(seg.raster(), Err(Error::UnsupportedImage(_))));

        seg.blocks_per_row = 9999;
        seg.blocks_per_column = 9999;
        seg.bands = vec![ImageBand::builder().build(); 99_999];
        seg.bits_per_pixel = 32;
        assert!(matches!(seg.raster(), Err(Error::UnsupportedImage(_))));
    }

    #[test]
    fn rgb_lookup_tables_expand() {
        let mut seg = segment(1, ImageMode::BlockInterleaved, vec![0, 1, 1, 0, 0, 1]);
        seg.representation = ImageRepresentation::RgbLut;
        seg.bands[0].luts = vec![vec![10, 20], vec![30, 40], vec![50, 60]];
        let img = seg.to_dynamic_image().unwrap();
        assert_eq!(img.to_rgb8().get_pixel(1, 0), &Rgb([20, 40, 60]));

        seg.data = SegmentData::Loaded(vec![0, 1, 2, 0, 0, 1]);
        assert!(seg.to_dynamic_image().is_err());
    }

    #[test]
    fn dynamic_images_convert_both_ways() {
        let grey = GrayImage::from_fn(5, 4, |x, y| Luma([(x * 10 + y) as u8]));
        let seg = ImageSegment::from_dynamic_image(
            &DynamicImage::ImageLuma8(grey.clone()),
            Dialect::Nitf21,
        )
        .unwrap();
        assert_eq!(seg.representation, ImageRepresentation::Monochrome);
        assert_eq!(seg.to_dynamic_image().unwrap(), DynamicImage::ImageLuma8(grey));

        let rgb = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8, y as u8, 7]));
        let seg = ImageSegment::from_dynamic_image(
            &DynamicImage::ImageRgb8(rgb.clone()),
            Dialect::Nitf20,
        )
        .unwrap();
        assert_eq!(seg.mode, ImageMode::PixelInterleaved);
        assert_eq!(seg.data().map(<[u8]>::len), Some(18));
        let back = seg.to_dynamic_image().unwrap();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back, DynamicImage::ImageRgb8(rgb));
    }
}
