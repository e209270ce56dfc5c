//! Per-band raster statistics that can be merged across tiles.
//!
//! A scan over one raster keeps a running Welford mean and sum of squared
//! deviations per band. Merging partial results with
//! [`RasterStatistics::aggregate`] also records each contribution as a
//! variance fragment, so the classic pooled estimate stays available next
//! to the exact combined variance.

use std::sync::Arc;

use tracing::debug;

use crate::blob::{BlobReader, BlobWriter, verify_trailing_crc};
use crate::codec::{Scale, decode_tile};
use crate::error::{Rl2Error, Rl2Result};
use crate::palette::Palette;
use crate::pixel::Pixel;
use crate::raster::{Raster, RasterSource};
use crate::sample::{Endianness, PixelSpec, SampleType};

const STATS_START: u8 = 0x00;
const STATS_MAGIC: u8 = 0x27;
const STATS_END: u8 = 0x28;
const BAND_START: u8 = 0x37;
const BAND_END: u8 = 0x47;

/// Sample count, mean and variance of one merged contribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceFragment {
    pub count: u64,
    pub mean: f64,
    pub variance: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct BandStatistics {
    min: f64,
    max: f64,
    mean: f64,
    sum_sq_diff: f64,
    histogram: Vec<f64>,
    fragments: Vec<VarianceFragment>,
}

impl BandStatistics {
    fn new(bins: usize) -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            sum_sq_diff: 0.0,
            histogram: vec![0.0; bins],
            fragments: Vec::new(),
        }
    }

    fn as_fragment(&self, count: u64) -> VarianceFragment {
        let variance = if count > 1 {
            self.sum_sq_diff / (count - 1) as f64
        } else {
            0.0
        };
        VarianceFragment {
            count,
            mean: self.mean,
            variance,
        }
    }

    /// Contributions this band stands for when merged into another
    fn contributions(&self, count: u64) -> Vec<VarianceFragment> {
        if self.fragments.is_empty() {
            vec![self.as_fragment(count)]
        } else {
            self.fragments.clone()
        }
    }
}

/// Counts and sample type of a statistics object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsSummary {
    pub nodata_count: u64,
    pub valid_count: u64,
    pub sample_type: SampleType,
    pub num_bands: u8,
}

/// Statistics of one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub stddev: f64,
    /// `Σ(n_i−1)·v_i / (Σn_i − k)` over merged fragments, when there are any
    pub pooled_variance: Option<f64>,
}

/// Mergeable per-band statistics for a set of tiles
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics {
    sample_type: SampleType,
    num_bands: u8,
    valid_count: u64,
    nodata_count: u64,
    bands: Vec<BandStatistics>,
}

impl RasterStatistics {
    /// Empty statistics for `num_bands` bands of `sample_type`
    pub fn new(sample_type: SampleType, num_bands: u8) -> Rl2Result<Self> {
        if num_bands == 0 {
            return Err(Rl2Error::type_mismatch("statistics need at least one band"));
        }
        let bins = sample_type.histogram_bins();
        Ok(Self {
            sample_type,
            num_bands,
            valid_count: 0,
            nodata_count: 0,
            bands: (0..num_bands).map(|_| BandStatistics::new(bins)).collect(),
        })
    }

    /// Scan every pixel of `raster`.
    ///
    /// Masked pixels, pixels equal to the NODATA pixel (`nodata`, or the
    /// raster's own when `None`) and floating-point pixels holding a NaN
    /// or infinite sample in any band are counted as NODATA.
    pub fn from_raster(raster: &Raster, nodata: Option<&Pixel>) -> Rl2Result<Self> {
        Self::from_source(raster, nodata.or(raster.nodata()))
    }

    /// Decode a tile at full resolution and scan it without building a
    /// [`Raster`].
    pub fn from_tile(
        odd: &[u8],
        even: Option<&[u8]>,
        palette: Option<Arc<Palette>>,
        nodata: Option<&Pixel>,
    ) -> Rl2Result<Self> {
        let tile = decode_tile(Scale::Full, odd, even, palette)?;
        Self::from_source(&tile, nodata.or(tile.nodata()))
    }

    fn from_source<S: RasterSource + ?Sized>(source: &S, nodata: Option<&Pixel>) -> Rl2Result<Self> {
        let spec = source.spec();
        if let Some(pixel) = nodata
            && pixel.spec() != spec
        {
            return Err(Rl2Error::type_mismatch(format!(
                "NODATA pixel is {:?} x{}, raster is {:?} x{}",
                pixel.sample_type(),
                pixel.num_bands(),
                spec.sample_type(),
                spec.num_bands()
            )));
        }
        let mut stats = Self::new(spec.sample_type(), spec.num_bands())?;
        stats.scan(source, nodata, spec);
        debug!(
            width = source.width(),
            height = source.height(),
            valid = stats.valid_count,
            nodata = stats.nodata_count,
            "scanned raster statistics"
        );
        Ok(stats)
    }

    fn scan<S: RasterSource + ?Sized>(&mut self, source: &S, nodata: Option<&Pixel>, spec: PixelSpec) {
        let nodata = nodata.map(Pixel::native_bytes);
        let floating = matches!(spec.sample_type(), SampleType::Float32 | SampleType::Float64);
        let bands = self.bands.len();
        for y in 0..source.height() {
            for x in 0..source.width() {
                // NaN and infinite samples would poison the running mean
                let skipped = source.is_transparent(x, y)
                    || nodata
                        .as_deref()
                        .is_some_and(|nd| source.pixel_bytes(x, y) == Some(nd))
                    || (floating
                        && (0..bands).any(|band| {
                            source.sample(band, x, y).is_some_and(|v| !v.is_finite())
                        }));
                if skipped {
                    self.nodata_count += 1;
                    continue;
                }
                self.valid_count += 1;
                let n = self.valid_count as f64;
                for (band, stats) in self.bands.iter_mut().enumerate() {
                    let Some(value) = source.sample(band, x, y) else {
                        continue;
                    };
                    stats.min = stats.min.min(value);
                    stats.max = stats.max.max(value);
                    let delta = value - stats.mean;
                    stats.mean += delta / n;
                    stats.sum_sq_diff += delta * (value - stats.mean);
                    if let Some(bin) = histogram_bin(spec.sample_type(), value) {
                        stats.histogram[bin] += 1.0;
                    }
                }
            }
        }
    }

    /// Merge `partial` into `self`.
    ///
    /// Merging is associative and commutative: any order of merging the
    /// same set of partial results yields the same statistics up to
    /// floating-point rounding.
    pub fn aggregate(&mut self, partial: &RasterStatistics) -> Rl2Result<()> {
        if partial.sample_type != self.sample_type || partial.num_bands != self.num_bands {
            return Err(Rl2Error::type_mismatch(format!(
                "cannot merge {:?} x{} statistics into {:?} x{}",
                partial.sample_type, partial.num_bands, self.sample_type, self.num_bands
            )));
        }
        debug!(
            valid = partial.valid_count,
            nodata = partial.nodata_count,
            "aggregating statistics"
        );

        self.nodata_count += partial.nodata_count;
        if partial.valid_count == 0 {
            return Ok(());
        }
        let (n_a, n_b) = (self.valid_count, partial.valid_count);
        let total = n_a + n_b;
        for (own, other) in self.bands.iter_mut().zip(&partial.bands) {
            let mut fragments = if n_a == 0 { Vec::new() } else { own.contributions(n_a) };
            fragments.extend(other.contributions(n_b));

            let delta = other.mean - own.mean;
            own.mean += delta * n_b as f64 / total as f64;
            own.sum_sq_diff += other.sum_sq_diff + delta * delta * (n_a as f64 * n_b as f64) / total as f64;
            own.min = own.min.min(other.min);
            own.max = own.max.max(other.max);
            for (bin, count) in own.histogram.iter_mut().zip(&other.histogram) {
                *bin += count;
            }
            own.fragments = fragments;
        }
        self.valid_count = total;
        Ok(())
    }

    #[must_use] pub fn summary(&self) -> StatisticsSummary {
        StatisticsSummary {
            nodata_count: self.nodata_count,
            valid_count: self.valid_count,
            sample_type: self.sample_type,
            num_bands: self.num_bands,
        }
    }

    #[must_use] pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    #[must_use] pub fn num_bands(&self) -> u8 {
        self.num_bands
    }

    #[must_use] pub fn valid_count(&self) -> u64 {
        self.valid_count
    }

    #[must_use] pub fn nodata_count(&self) -> u64 {
        self.nodata_count
    }

    fn band(&self, band: usize) -> Rl2Result<&BandStatistics> {
        self.bands.get(band).ok_or_else(|| {
            Rl2Error::out_of_range(format!("band {band} outside 0..{}", self.num_bands))
        })
    }

    /// Min, max, mean and variance of `band`.
    ///
    /// Fails with `NoData` while no valid sample has been seen.
    pub fn band_summary(&self, band: usize) -> Rl2Result<BandSummary> {
        let stats = self.band(band)?;
        if self.valid_count == 0 {
            return Err(Rl2Error::NoData(format!("band {band} has no valid samples")));
        }
        let n = self.valid_count;
        let variance = if stats.fragments.is_empty() {
            if n > 1 { stats.sum_sq_diff / (n - 1) as f64 } else { 0.0 }
        } else {
            combined_variance(&stats.fragments, stats.mean, n)
        };
        Ok(BandSummary {
            min: stats.min,
            max: stats.max,
            mean: stats.mean,
            variance,
            stddev: variance.sqrt(),
            pooled_variance: pooled_variance(&stats.fragments),
        })
    }

    /// Histogram of `band`; empty for sample types wider than 8 bits
    pub fn band_histogram(&self, band: usize) -> Rl2Result<&[f64]> {
        Ok(&self.band(band)?.histogram)
    }

    /// Fragments recorded by [`aggregate`](Self::aggregate) for `band`
    pub fn band_fragments(&self, band: usize) -> Rl2Result<&[VarianceFragment]> {
        Ok(&self.band(band)?.fragments)
    }

    /// Serialize in host byte order
    #[must_use] pub fn to_blob(&self) -> Vec<u8> {
        let order = Endianness::native();
        let mut writer = BlobWriter::new(order);
        writer.u8(STATS_START);
        writer.u8(STATS_MAGIC);
        writer.u8(order.flag());
        writer.u8(self.sample_type.code());
        writer.u8(self.num_bands);
        writer.u64(self.valid_count);
        writer.u64(self.nodata_count);
        for band in &self.bands {
            writer.u8(BAND_START);
            writer.f64(band.min);
            writer.f64(band.max);
            writer.f64(band.mean);
            writer.f64(band.sum_sq_diff);
            // at most 256 bins
            writer.u16(band.histogram.len() as u16);
            for &count in &band.histogram {
                writer.f64(count);
            }
            writer.u32(band.fragments.len() as u32);
            for fragment in &band.fragments {
                writer.u64(fragment.count);
                writer.f64(fragment.mean);
                writer.f64(fragment.variance);
            }
            writer.u8(BAND_END);
        }
        writer.push_crc();
        writer.u8(STATS_END);
        writer.into_inner()
    }

    pub fn from_blob(blob: &[u8]) -> Rl2Result<Self> {
        let (&end, framed) = blob
            .split_last()
            .ok_or_else(|| Rl2Error::malformed("empty statistics BLOB"))?;
        if end != STATS_END || framed.len() < 3 {
            return Err(Rl2Error::malformed("statistics BLOB is not terminated"));
        }
        let order = Endianness::from_flag(framed[2])?;
        let body = verify_trailing_crc(framed, order)?;
        let mut reader = BlobReader::new(body, order);
        reader.expect_marker(STATS_START, "statistics start")?;
        reader.expect_marker(STATS_MAGIC, "statistics")?;
        reader.u8()?;
        let sample_type = SampleType::from_code(reader.u8()?)?;
        let num_bands = reader.u8()?;
        let mut stats = Self::new(sample_type, num_bands)
            .map_err(|e| Rl2Error::malformed(format!("statistics header: {e}")))?;
        stats.valid_count = reader.u64()?;
        stats.nodata_count = reader.u64()?;

        let bins = sample_type.histogram_bins();
        for band in &mut stats.bands {
            read_band(&mut reader, band, bins)?;
            let merged: u64 = band.fragments.iter().map(|f| f.count).sum();
            if !band.fragments.is_empty() && merged != stats.valid_count {
                return Err(Rl2Error::malformed(format!(
                    "fragments cover {merged} samples, statistics hold {}",
                    stats.valid_count
                )));
            }
        }
        if reader.position() != body.len() {
            return Err(Rl2Error::malformed("trailing bytes in statistics BLOB"));
        }
        Ok(stats)
    }
}

fn read_band(reader: &mut BlobReader<'_>, band: &mut BandStatistics, bins: usize) -> Rl2Result<()> {
    reader.expect_marker(BAND_START, "band start")?;
    band.min = reader.f64()?;
    band.max = reader.f64()?;
    band.mean = reader.f64()?;
    band.sum_sq_diff = reader.f64()?;
    let stored_bins = reader.u16()? as usize;
    if stored_bins != bins {
        return Err(Rl2Error::malformed(format!(
            "histogram of {stored_bins} bins, sample type needs {bins}"
        )));
    }
    for bin in &mut band.histogram {
        *bin = reader.f64()?;
    }
    let fragments = reader.u32()?;
    for _ in 0..fragments {
        band.fragments.push(VarianceFragment {
            count: reader.u64()?,
            mean: reader.f64()?,
            variance: reader.f64()?,
        });
    }
    reader.expect_marker(BAND_END, "band end")
}

fn histogram_bin(sample_type: SampleType, value: f64) -> Option<usize> {
    let bins = sample_type.histogram_bins();
    if bins == 0 {
        return None;
    }
    let offset = if sample_type == SampleType::Int8 { 128.0 } else { 0.0 };
    let bin = (value + offset) as usize;
    (bin < bins).then_some(bin)
}

/// `(Σ(n_i−1)·v_i + Σn_i·(m_i − M)²) / (N − 1)`
fn combined_variance(fragments: &[VarianceFragment], mean: f64, count: u64) -> f64 {
    if count < 2 {
        return 0.0;
    }
    let within: f64 = fragments
        .iter()
        .map(|f| f.count.saturating_sub(1) as f64 * f.variance)
        .sum();
    let between: f64 = fragments
        .iter()
        .map(|f| f.count as f64 * (f.mean - mean).powi(2))
        .sum();
    (within + between) / (count - 1) as f64
}

fn pooled_variance(fragments: &[VarianceFragment]) -> Option<f64> {
    let total: u64 = fragments.iter().map(|f| f.count).sum();
    let k = fragments.len() as u64;
    if fragments.is_empty() || total <= k {
        return None;
    }
    let within: f64 = fragments
        .iter()
        .map(|f| (f.count - 1) as f64 * f.variance)
        .sum();
    Some(within / (total - k) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::compression::Compression;
    use crate::sample::PixelType;

    fn gray8(width: u32, height: u32, buffer: Vec<u8>) -> Raster {
        let spec = PixelSpec::new(SampleType::UInt8, PixelType::Grayscale, 1).unwrap();
        Raster::new(width, height, spec, buffer).unwrap()
    }

    fn assert_close(a: f64, b: f64, what: &str) {
        assert!((a - b).abs() < 1e-9 * b.abs().max(1.0), "{what}: {a} != {b}");
    }

    #[test]
    fn test_scenario_two_by_two() {
        let raster = gray8(2, 2, vec![10, 20, 30, 40]);
        let stats = RasterStatistics::from_raster(&raster, None).unwrap();
        let summary = stats.summary();
        assert_eq!(summary.valid_count, 4);
        assert_eq!(summary.nodata_count, 0);
        let band = stats.band_summary(0).unwrap();
        assert_eq!(band.min, 10.0);
        assert_eq!(band.max, 40.0);
        assert_eq!(band.mean, 25.0);
        assert_close(band.variance, 500.0 / 3.0, "sample variance");
        assert_eq!(band.pooled_variance, None, "a single scan has no fragments");
        assert_eq!(stats.band_histogram(0).unwrap()[30], 1.0);
    }

    #[test]
    fn test_nodata_and_mask_excluded() {
        let mut nodata = Pixel::new(SampleType::UInt8, PixelType::Grayscale, 1).unwrap();
        nodata.set_sample_uint8(0, 0).unwrap();
        let raster = gray8(4, 1, vec![0, 5, 7, 9]).with_mask(vec![0b0001_0000]).unwrap();

        let stats = RasterStatistics::from_raster(&raster, Some(&nodata)).unwrap();
        assert_eq!(stats.valid_count(), 2);
        assert_eq!(stats.nodata_count(), 2, "one NODATA pixel and one masked pixel");
        let band = stats.band_summary(0).unwrap();
        assert_eq!((band.min, band.max), (5.0, 7.0));

        let wrong = Pixel::new(SampleType::UInt16, PixelType::DataGrid, 1).unwrap();
        assert!(matches!(
            RasterStatistics::from_raster(&raster, Some(&wrong)),
            Err(Rl2Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_aggregate_matches_whole_raster() {
        let values: Vec<u8> = (0..64u32).map(|i| ((i * 53) % 199) as u8).collect();
        let whole = RasterStatistics::from_raster(&gray8(8, 8, values.clone()), None).unwrap();
        let expected = whole.band_summary(0).unwrap();

        let chunks: Vec<RasterStatistics> = values
            .chunks(16)
            .map(|rows| RasterStatistics::from_raster(&gray8(8, 2, rows.to_vec()), None).unwrap())
            .collect();
        for order in [[0, 1, 2, 3], [3, 1, 0, 2], [2, 3, 1, 0]] {
            let mut total = RasterStatistics::new(SampleType::UInt8, 1).unwrap();
            for i in order {
                total.aggregate(&chunks[i]).unwrap();
            }
            let merged = total.band_summary(0).unwrap();
            assert_eq!(total.valid_count(), 64);
            assert_close(merged.mean, expected.mean, "mean");
            assert_close(merged.variance, expected.variance, "variance");
            assert_eq!((merged.min, merged.max), (expected.min, expected.max));
            assert_eq!(total.band_fragments(0).unwrap().len(), 4);
            assert_eq!(total.band_histogram(0).unwrap(), whole.band_histogram(0).unwrap());
        }
    }

    #[test]
    fn test_aggregate_nested_partials() {
        let values: Vec<u8> = (0..48u32).map(|i| (i * i % 97) as u8).collect();
        let whole = RasterStatistics::from_raster(&gray8(6, 8, values.clone()), None).unwrap();
        let parts: Vec<RasterStatistics> = values
            .chunks(12)
            .map(|rows| RasterStatistics::from_raster(&gray8(6, 2, rows.to_vec()), None).unwrap())
            .collect();

        let mut left = parts[0].clone();
        left.aggregate(&parts[1]).unwrap();
        let mut right = parts[2].clone();
        right.aggregate(&parts[3]).unwrap();
        left.aggregate(&right).unwrap();

        let merged = left.band_summary(0).unwrap();
        let expected = whole.band_summary(0).unwrap();
        assert_close(merged.variance, expected.variance, "(a+b)+(c+d)");
        assert_close(merged.mean, expected.mean, "mean");
    }

    #[test]
    fn test_pooled_variance() {
        let a = RasterStatistics::from_raster(&gray8(2, 1, vec![1, 3]), None).unwrap();
        let b = RasterStatistics::from_raster(&gray8(2, 1, vec![11, 13]), None).unwrap();
        let mut total = a.clone();
        total.aggregate(&b).unwrap();
        let band = total.band_summary(0).unwrap();
        // both groups have variance 2; pooled ignores the gap between means
        assert_close(band.pooled_variance.unwrap(), 2.0, "pooled");
        assert_close(band.variance, 104.0 / 3.0, "combined");
    }

    #[test]
    fn test_empty_statistics() {
        assert!(matches!(RasterStatistics::new(SampleType::UInt8, 0), Err(Rl2Error::TypeMismatch(_))));
        let stats = RasterStatistics::new(SampleType::Float32, 2).unwrap();
        assert!(matches!(stats.band_summary(0), Err(Rl2Error::NoData(_))));
        assert!(matches!(stats.band_summary(2), Err(Rl2Error::OutOfRange(_))));
        assert!(stats.band_histogram(1).unwrap().is_empty());

        let mut other = RasterStatistics::new(SampleType::UInt8, 2).unwrap();
        assert!(matches!(other.aggregate(&stats), Err(Rl2Error::TypeMismatch(_))));
    }

    #[test]
    fn test_from_tile_matches_from_raster() {
        let spec = PixelSpec::new(SampleType::Int16, PixelType::DataGrid, 1).unwrap();
        let buffer: Vec<u8> = (0..30i16).flat_map(|v| (v * 100 - 1500).to_ne_bytes()).collect();
        let mut nodata = Pixel::from_spec(spec);
        nodata.set_sample_int16(-1500).unwrap();
        let raster = Raster::new(6, 5, spec, buffer).unwrap().with_nodata(nodata).unwrap();

        let tile = encode(&raster, Compression::Deflate, 80).unwrap();
        let from_tile = RasterStatistics::from_tile(&tile.odd, tile.even(), None, None).unwrap();
        let from_raster = RasterStatistics::from_raster(&raster, None).unwrap();
        assert_eq!(from_tile, from_raster);
        assert_eq!(from_tile.nodata_count(), 1, "embedded NODATA pixel is honoured");
        assert_eq!(from_tile.band_summary(0).unwrap().min, -1400.0);
    }

    #[test]
    fn test_statistics_blob_roundtrip() {
        let mut total = RasterStatistics::new(SampleType::UInt8, 1).unwrap();
        total.aggregate(&RasterStatistics::from_raster(&gray8(2, 2, vec![1, 2, 3, 4]), None).unwrap()).unwrap();
        total.aggregate(&RasterStatistics::from_raster(&gray8(2, 1, vec![9, 9]), None).unwrap()).unwrap();

        let blob = total.to_blob();
        assert_eq!(&blob[..2], &[0x00, 0x27]);
        assert_eq!(blob[blob.len() - 1], 0x28);
        let restored = RasterStatistics::from_blob(&blob).unwrap();
        assert_eq!(restored, total);
        assert_eq!(restored.band_summary(0).unwrap(), total.band_summary(0).unwrap());

        let mut corrupt = blob.clone();
        corrupt[12] ^= 0x01;
        assert!(matches!(RasterStatistics::from_blob(&corrupt), Err(Rl2Error::MalformedBlob(_))));
        assert!(RasterStatistics::from_blob(&blob[..blob.len() - 1]).is_err());
    }

    #[test]
    fn test_statistics_blob_fragment_counts_checked() {
        let mut total = RasterStatistics::new(SampleType::UInt8, 1).unwrap();
        total.aggregate(&RasterStatistics::from_raster(&gray8(2, 2, vec![1, 2, 3, 4]), None).unwrap()).unwrap();
        total.aggregate(&RasterStatistics::from_raster(&gray8(2, 1, vec![9, 9]), None).unwrap()).unwrap();
        total.bands[0].fragments[1].count = 5;

        // the CRC is recomputed over the tampered counts
        let blob = total.to_blob();
        assert!(
            matches!(RasterStatistics::from_blob(&blob), Err(Rl2Error::MalformedBlob(_))),
            "fragment counts must add up to the valid count"
        );
    }

    #[test]
    fn test_non_finite_samples_counted_as_nodata() {
        let spec = PixelSpec::new(SampleType::Float32, PixelType::DataGrid, 1).unwrap();
        let buffer: Vec<u8> = [1.0f32, f32::NAN, 3.0, f32::INFINITY]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let raster = Raster::new(2, 2, spec, buffer).unwrap();

        let stats = RasterStatistics::from_raster(&raster, None).unwrap();
        assert_eq!(stats.valid_count(), 2);
        assert_eq!(stats.nodata_count(), 2, "NaN and infinity are not valid samples");
        let band = stats.band_summary(0).unwrap();
        assert_eq!((band.min, band.max), (1.0, 3.0));
        assert_eq!(band.mean, 2.0);
        assert_close(band.variance, 2.0, "variance");

        let mut total = RasterStatistics::new(SampleType::Float32, 1).unwrap();
        total.aggregate(&stats).unwrap();
        total.aggregate(&stats).unwrap();
        assert!(total.band_summary(0).unwrap().mean.is_finite(), "merging stays finite");
    }
}
