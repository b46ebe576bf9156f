//! The write-side driver: batches records into zstd frames, runs the PBWT
//! forward transform on tracked FORMAT fields, and emits an S1R sidecar
//! tracking each frame's chromosome span.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use typed_value::TypedValue;

use crate::dictionary::{self, DictionaryBundle};
use crate::error::SavError;
use crate::frame;
use crate::header::{self, Header};
use crate::site_info::SiteInfo;
use crate::variant;

const DEFAULT_BLOCK_SIZE: usize = 4096;
const DEFAULT_INDEX_BLOCK_SIZE: u32 = 4096;
const ZSTD_LEVEL: i32 = 3;

struct PendingFrame {
    bytes: Vec<u8>,
    chrom: Option<i32>,
    records: u32,
    min_pos: u64,
    max_pos: u64,
}

impl PendingFrame {
    fn new() -> Self {
        Self { bytes: Vec::new(), chrom: None, records: 0, min_pos: u64::MAX, max_pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// Writes a `.sav` file and its `.s1r` sidecar. Callers present records in
/// chromosome-contiguous order; a chromosome change always flushes the
/// current frame.
pub struct Writer {
    file: File,
    s1r_path: PathBuf,
    pub header: Header,
    dictionary: DictionaryBundle,
    block_size: usize,
    index_block_size: u32,
    file_pos: u64,
    pending: PendingFrame,
    leaf_entries: AHashMap<i32, Vec<s1r::LeafEntry>>,
    chrom_names: AHashMap<i32, String>,
    pbwt_states: AHashMap<i32, pbwt::PbwtState>,
    good: bool,
    finished: bool,
}

impl Writer {
    pub fn create(path: impl AsRef<Path>, header: &Header) -> Result<Self, SavError> {
        let path = path.as_ref();
        let dictionary = dictionary::build(header)?;
        let mut file = File::create(path)?;

        let text = header.render();
        let mut body = text.into_bytes();
        body.push(0);
        file.write_all(&header::MAGIC)?;
        file.write_all(&(body.len() as u32).to_le_bytes())?;
        file.write_all(&body)?;

        let file_pos = (header::MAGIC.len() + 4 + body.len()) as u64;
        let mut s1r_name = path.as_os_str().to_os_string();
        s1r_name.push(".s1r");

        Ok(Self {
            file,
            s1r_path: PathBuf::from(s1r_name),
            header: header.clone(),
            dictionary,
            block_size: DEFAULT_BLOCK_SIZE,
            index_block_size: DEFAULT_INDEX_BLOCK_SIZE,
            file_pos,
            pending: PendingFrame::new(),
            leaf_entries: AHashMap::default(),
            chrom_names: AHashMap::default(),
            pbwt_states: AHashMap::default(),
            good: true,
            finished: false,
        })
    }

    pub fn good(&self) -> bool {
        self.good
    }

    pub fn dictionary(&self) -> &sav_dictionary::Dictionary {
        &self.dictionary.dictionary
    }

    /// Overrides the default 4096-record block size. Only meaningful before
    /// the first [`Writer::write_record`] call.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Overrides the default 4096-byte S1R sidecar block size. Must be a
    /// multiple of 1024 (the on-disk header packs it as KiB minus one).
    pub fn with_index_block_size(mut self, index_block_size: u32) -> Self {
        self.index_block_size = index_block_size;
        self
    }

    pub fn write_record(&mut self, chrom_name: &str, site: &SiteInfo, format: &[(i32, TypedValue)]) -> Result<(), SavError> {
        let chrom_changed = self.pending.chrom.is_some_and(|c| c != site.chrom_code);
        if !self.pending.is_empty() && (chrom_changed || self.pending.records as usize >= self.block_size) {
            self.flush_frame()?;
        }
        self.chrom_names.entry(site.chrom_code).or_insert_with(|| chrom_name.to_string());

        let reset = self.pending.is_empty();
        let encoded_format = self.encode_format(format, reset)?;

        let mut shared = Vec::new();
        site.serialize(reset, encoded_format.len() as u32, &mut shared);
        let mut indiv = Vec::new();
        for (key, value) in &encoded_format {
            typed_value::write_typed_int(i64::from(*key), &mut indiv);
            value.serialize(&mut indiv);
        }

        self.pending.bytes.extend_from_slice(&(shared.len() as u32).to_le_bytes());
        self.pending.bytes.extend_from_slice(&(indiv.len() as u32).to_le_bytes());
        self.pending.bytes.extend_from_slice(&shared);
        self.pending.bytes.extend_from_slice(&indiv);

        self.pending.chrom = Some(site.chrom_code);
        self.pending.records += 1;
        let pos = site.pos_one_based();
        let end = site.record_end();
        self.pending.min_pos = self.pending.min_pos.min(pos);
        self.pending.max_pos = self.pending.max_pos.max(end);
        Ok(())
    }

    fn encode_format(&mut self, format: &[(i32, TypedValue)], reset: bool) -> Result<Vec<(i32, TypedValue)>, SavError> {
        let mut out = Vec::with_capacity(format.len());
        for &(key, ref value) in format {
            if !self.dictionary.pbwt_targets.contains(&(key as u32)) {
                out.push((key, value.clone()));
                continue;
            }
            let dense = variant::dense_i64(value)?;
            let state = self.pbwt_states.entry(key).or_insert_with(|| pbwt::PbwtState::identity(dense.len()));
            if reset && state.len() != dense.len() {
                *state = pbwt::PbwtState::identity(dense.len());
            } else if reset {
                state.reset();
            }
            let encoded = state.encode(&dense)?;
            out.push((key, variant::rewrap_i64(value, encoded)?));
        }
        Ok(out)
    }

    fn flush_frame(&mut self) -> Result<(), SavError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let compressed = frame::encode_frame(&self.pending.bytes, ZSTD_LEVEL)?;
        let frame_offset = self.file_pos;
        let value = s1r::LeafEntry::pack_sav_value(frame_offset, self.pending.records).ok_or(SavError::IndexOverflow)?;

        self.file.write_all(&compressed)?;
        self.file_pos += compressed.len() as u64;

        let chrom = self.pending.chrom.expect("non-empty frame always has a chromosome");
        let entry = s1r::LeafEntry::new(self.pending.min_pos, self.pending.max_pos, value);
        self.leaf_entries.entry(chrom).or_default().push(entry);

        self.pending = PendingFrame::new();
        Ok(())
    }

    /// Flushes the final frame and writes the `.s1r` sidecar. Consumes the
    /// writer so a caller cannot append after finalizing.
    pub fn finish(mut self) -> Result<(), SavError> {
        self.flush_frame()?;
        self.file.flush()?;
        self.write_sidecar()?;
        self.finished = true;
        Ok(())
    }

    fn write_sidecar(&self) -> Result<(), SavError> {
        let block_size = self.index_block_size;
        let mut chroms: Vec<(i32, &str, &[s1r::LeafEntry])> = self
            .leaf_entries
            .iter()
            .map(|(code, entries)| (*code, self.chrom_names.get(code).map(String::as_str).unwrap_or(""), entries.as_slice()))
            .collect();
        chroms.sort_by_key(|(code, ..)| *code);

        let mut header = Vec::new();
        header.extend_from_slice(&s1r::MAGIC);
        header.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        header.push(s1r::SortTieBreak::Midpoint.to_byte());
        header.push((block_size / 1024 - 1) as u8);

        let mut trees = Vec::with_capacity(chroms.len());
        for (_, name, entries) in &chroms {
            let mut sorted = entries.to_vec();
            sorted.sort_by(|a, b| {
                s1r::SortTieBreak::Midpoint.sort_key(a).partial_cmp(&s1r::SortTieBreak::Midpoint.sort_key(b)).unwrap()
            });
            let (layout, bytes) = s1r::build_tree(&sorted, block_size);
            header.push(name.len() as u8);
            header.extend_from_slice(name.as_bytes());
            header.extend_from_slice(&layout.entry_count().to_be_bytes());
            trees.push(bytes);
        }
        header.push(0);

        let block = block_size as usize;
        let padded_len = (header.len() + block - 1) / block * block;
        header.resize(padded_len, 0);

        let mut sidecar = File::create(&self.s1r_path)?;
        sidecar.write_all(&header)?;
        for tree in trees {
            sidecar.write_all(&tree)?;
        }
        sidecar.flush()?;
        Ok(())
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.flush_frame().is_err() || self.file.flush().is_err() || self.write_sidecar().is_err() {
            self.good = false;
            log::error!("SAV writer could not flush its final frame or sidecar on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderLine;
    use crate::reader::{ReadOutcome, Reader};
    use crate::region::BoundingPoint;
    use pretty_assertions::assert_eq;
    use typed_value::{TypedValue, ValueVec};

    fn test_header() -> Header {
        Header::new(
            vec![
                HeaderLine { key: "contig".into(), value: "<ID=20,length=63025520>".into() },
                HeaderLine { key: "FORMAT".into(), value: "<ID=GT,Number=2,Type=Integer>".into() },
                HeaderLine { key: "INFO".into(), value: "<ID=_PBWT_SORT_GT,Number=0,Type=Flag,Format=GT>".into() },
            ],
            vec!["S0".into(), "S1".into()],
        )
    }

    fn site(pos_zero_based: u32, reference: &[u8], alts: &[&[u8]]) -> SiteInfo {
        SiteInfo {
            chrom_code: 0,
            pos_zero_based,
            id: Vec::new(),
            reference: reference.to_vec(),
            alts: alts.iter().map(|a| a.to_vec()).collect(),
            qual: f32::NAN,
            filter_codes: vec![0],
            info: Vec::new(),
        }
    }

    #[test]
    fn write_then_read_round_trips_records_and_pbwt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.sav");
        let header = test_header();

        let mut writer = Writer::create(&path, &header).unwrap();
        let gt_code = writer.dictionary().id.code_of("GT").unwrap() as i32;

        let genotypes = [vec![0i8, 1, 0, 1], vec![1, 1, 0, 0], vec![0, 0, 1, 1]];
        for (i, gt) in genotypes.iter().enumerate() {
            let s = site(100 + i as u32, b"A", &[b"G"]);
            let format = vec![(gt_code, TypedValue::Int8(ValueVec::Dense(gt.clone())))];
            writer.write_record("20", &s, &format).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert!(reader.good());
        for (i, gt) in genotypes.iter().enumerate() {
            match reader.read().unwrap() {
                ReadOutcome::Delivered(variant) => {
                    assert_eq!(variant.site.pos_one_based(), 101 + i as u64);
                    let (key, value) = &variant.format[0];
                    assert_eq!(*key, gt_code);
                    assert_eq!(variant::dense_i64(value).unwrap(), gt.iter().map(|&x| i64::from(x)).collect::<Vec<_>>());
                }
                ReadOutcome::Eof => panic!("expected a record, got eof"),
            }
        }
        assert!(matches!(reader.read().unwrap(), ReadOutcome::Eof));
    }

    #[test]
    fn pbwt_resets_at_every_new_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("framed.sav");
        let header = test_header();

        let mut writer = Writer::create(&path, &header).unwrap().with_block_size(2);
        let gt_code = writer.dictionary().id.code_of("GT").unwrap() as i32;
        for i in 0..5 {
            let s = site(100 + i, b"A", &[b"G"]);
            let gt = vec![0i8, 1, 1, 0];
            let format = vec![(gt_code, TypedValue::Int8(ValueVec::Dense(gt)))];
            writer.write_record("20", &s, &format).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        let mut count = 0;
        loop {
            match reader.read().unwrap() {
                ReadOutcome::Delivered(variant) => {
                    let (_, value) = &variant.format[0];
                    assert_eq!(variant::dense_i64(value).unwrap(), vec![0, 1, 1, 0]);
                    count += 1;
                }
                ReadOutcome::Eof => break,
            }
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn indexed_region_query_filters_by_bounding_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexed.sav");
        let header = test_header();

        let mut writer = Writer::create(&path, &header).unwrap();
        let gt_code = writer.dictionary().id.code_of("GT").unwrap() as i32;
        for i in 0..3 {
            let s = site(100 + i, b"A", &[b"G"]);
            let format = vec![(gt_code, TypedValue::Int8(ValueVec::Dense(vec![0, 1, 0, 1])))];
            writer.write_record("20", &s, &format).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        reader.reset_bounds("20", 102, 102, BoundingPoint::Any).unwrap();
        let mut positions = Vec::new();
        loop {
            match reader.read().unwrap() {
                ReadOutcome::Delivered(variant) => positions.push(variant.site.pos_one_based()),
                ReadOutcome::Eof => break,
            }
        }
        assert_eq!(positions, vec![102]);
    }

    #[test]
    fn sample_subset_narrows_format_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subset.sav");
        let header = test_header();

        let mut writer = Writer::create(&path, &header).unwrap();
        let gt_code = writer.dictionary().id.code_of("GT").unwrap() as i32;
        let s = site(100, b"A", &[b"G"]);
        let format = vec![(gt_code, TypedValue::Int8(ValueVec::Dense(vec![0, 1, 1, 0])))];
        writer.write_record("20", &s, &format).unwrap();
        writer.finish().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        reader.subset_samples(&["S1"]).unwrap();
        match reader.read().unwrap() {
            ReadOutcome::Delivered(variant) => {
                let (_, value) = &variant.format[0];
                assert_eq!(variant::dense_i64(value).unwrap(), vec![1, 0]);
            }
            ReadOutcome::Eof => panic!("expected a record"),
        }
    }
}
