//! The random-access reader: parses the header, decodes frames on demand
//! (sequentially or driven by an S1R sidecar query), inverts PBWT, and
//! applies an optional sample subset before a record reaches the caller.

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use memmap2::Mmap;

use crate::dictionary::{self, DictionaryBundle};
use crate::error::SavError;
use crate::frame;
use crate::header::{self, Header};
use crate::region::BoundingPoint;
use crate::site_info::SiteInfo;
use crate::variant::{self, Variant};

#[derive(Debug)]
pub enum ReadOutcome {
    Delivered(Variant),
    Eof,
}

struct FrameCursor {
    bytes: Vec<u8>,
    pos: usize,
    records_left: Option<u32>,
}

impl FrameCursor {
    fn empty() -> Self {
        Self { bytes: Vec::new(), pos: 0, records_left: Some(0) }
    }

    fn is_exhausted(&self) -> bool {
        match self.records_left {
            Some(left) => left == 0,
            None => self.pos >= self.bytes.len(),
        }
    }
}

enum Mode {
    Sequential { next_offset: u64 },
    Indexed { queue: VecDeque<s1r::LeafEntry> },
    /// Driven by an external CSI/TBI binning index: `chunks` are
    /// file-offset ranges still to scan, `current` is `(cursor, chunk_end)`
    /// for the chunk presently being walked frame by frame.
    Csi { chunks: VecDeque<(u64, u64)>, current: Option<(u64, u64)> },
}

fn parse_header(bytes: &[u8]) -> Result<(Header, u64), SavError> {
    if bytes.len() < header::MAGIC.len() + 4 {
        return Err(SavError::TruncatedRecord);
    }
    if bytes[0..header::MAGIC.len()] != header::MAGIC {
        return Err(SavError::CorruptHeader("bad SAV magic".into()));
    }
    let len_pos = header::MAGIC.len();
    let len = u32::from_le_bytes(bytes[len_pos..len_pos + 4].try_into().unwrap()) as usize;
    let body_start = len_pos + 4;
    let text_bytes = bytes.get(body_start..body_start + len).ok_or(SavError::TruncatedRecord)?;
    let text = std::str::from_utf8(text_bytes).map_err(|_| SavError::CorruptHeader("header is not valid utf-8".into()))?;
    let header = Header::parse(text.trim_end_matches('\0'))?;
    Ok((header, (body_start + len) as u64))
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".s1r");
    PathBuf::from(name)
}

fn csi_sidecar_path(path: &Path) -> Option<PathBuf> {
    for ext in [".csi", ".tbi"] {
        let mut name = path.as_os_str().to_os_string();
        name.push(ext);
        let candidate = PathBuf::from(name);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Sequential reader over a `.sav` file, optionally driven by an S1R sidecar
/// index and an optional sample subset.
pub struct Reader {
    mmap: Mmap,
    pub header: Header,
    dictionary: DictionaryBundle,
    body_offset: u64,
    forest: Option<s1r::Forest>,
    csi: Option<csi::Index>,
    pbwt_states: AHashMap<i32, pbwt::PbwtState>,
    mode: Mode,
    frame: FrameCursor,
    region: Option<(i32, u64, u64, BoundingPoint)>,
    sample_subset: Option<(Vec<u64>, u64)>,
    ploidy_cache: AHashMap<u64, (Vec<u64>, u64)>,
    good: bool,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SavError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let (header, body_offset) = parse_header(&mmap)?;
        let dictionary = dictionary::build(&header)?;

        let forest_path = sidecar_path(path);
        let forest = if forest_path.exists() { Some(s1r::Forest::open_mmap(&forest_path)?) } else { None };
        let csi = match forest {
            Some(_) => None,
            None => csi_sidecar_path(path).map(csi::Index::open).transpose()?,
        };

        Ok(Self {
            mmap,
            header,
            dictionary,
            body_offset,
            forest,
            csi,
            pbwt_states: AHashMap::default(),
            mode: Mode::Sequential { next_offset: body_offset },
            frame: FrameCursor::empty(),
            region: None,
            sample_subset: None,
            ploidy_cache: AHashMap::default(),
            good: true,
        })
    }

    pub fn good(&self) -> bool {
        self.good
    }

    pub fn dictionary(&self) -> &sav_dictionary::Dictionary {
        &self.dictionary.dictionary
    }

    /// The S1R sidecar's block size in bytes, if one was found next to the file.
    pub fn index_block_size(&self) -> Option<u32> {
        self.forest.as_ref().map(|f| f.block_size)
    }

    /// Restricts subsequent reads to records overlapping `[begin, end]` on
    /// `chrom`. Prefers the `.s1r` sidecar (`S1R_QUERYING`); falls through to
    /// a `.csi`/`.tbi` sidecar (`CSI_QUERYING`) if no `.s1r` was found; errors
    /// if neither index is present.
    pub fn reset_bounds(&mut self, chrom: &str, begin: u64, end: u64, bounding_point: BoundingPoint) -> Result<(), SavError> {
        let chrom_code = self
            .dictionary
            .dictionary
            .contig
            .code_of(chrom)
            .ok_or_else(|| SavError::UnknownChromosome(chrom.to_string()))?;

        if let Some(forest) = &self.forest {
            let queue: VecDeque<s1r::LeafEntry> = forest.query(chrom, begin, end)?.collect();
            self.mode = Mode::Indexed { queue };
        } else if let Some(index) = &self.csi {
            let intervals = index.query_intervals(chrom, None, begin as i64, end as i64)?;
            let chunks: VecDeque<(u64, u64)> = intervals
                .into_iter()
                .map(|(begin_voffset, end_voffset)| (csi::split_virtual_offset(begin_voffset).0, csi::split_virtual_offset(end_voffset).0))
                .collect();
            self.mode = Mode::Csi { chunks, current: None };
        } else {
            return Err(SavError::NoIndex);
        }
        self.frame = FrameCursor::empty();
        self.region = Some((chrom_code as i32, begin, end, bounding_point));
        Ok(())
    }

    /// Reverts to an unbounded sequential scan from the start of the record
    /// stream.
    pub fn clear_bounds(&mut self) {
        self.mode = Mode::Sequential { next_offset: self.body_offset };
        self.frame = FrameCursor::empty();
        self.region = None;
    }

    /// Restricts every subsequently decoded FORMAT vector to `names`. Names
    /// absent from the header are ignored; if none of `names` resolve, the
    /// reader keeps working but every sample-shaped field decodes empty,
    /// and a warning is logged once.
    pub fn subset_samples(&mut self, names: &[&str]) -> Result<(), SavError> {
        let total = self.header.samples.len() as u64;
        let mut sample_map = vec![typed_value::SENTINEL; total as usize];
        let mut kept = 0u64;
        for name in names {
            if let Some(code) = self.dictionary.dictionary.sample.code_of(name) {
                sample_map[code as usize] = kept;
                kept += 1;
            }
        }
        if kept == 0 {
            logger::WarnOnce::warn(SavError::SampleSubsetEmpty.to_string());
        }
        self.sample_subset = Some((sample_map, kept));
        self.ploidy_cache.clear();
        Ok(())
    }

    pub fn read(&mut self) -> Result<ReadOutcome, SavError> {
        loop {
            match self.next_raw()? {
                None => return Ok(ReadOutcome::Eof),
                Some(variant) => {
                    if self.matches_region(&variant) {
                        return Ok(ReadOutcome::Delivered(variant));
                    }
                }
            }
        }
    }

    fn next_raw(&mut self) -> Result<Option<Variant>, SavError> {
        loop {
            if !self.frame.is_exhausted() {
                let (site, reset, n_fmt, consumed) = SiteInfo::deserialize(&self.frame.bytes[self.frame.pos..])?;
                self.frame.pos += consumed;
                let (format, consumed) = Variant::deserialize_individual(&self.frame.bytes[self.frame.pos..], n_fmt)?;
                self.frame.pos += consumed;
                if let Some(left) = self.frame.records_left.as_mut() {
                    *left -= 1;
                }
                let mut variant = Variant { site, format };
                self.apply_pbwt_decode(&mut variant, reset)?;
                self.apply_sample_subset(&mut variant);
                return Ok(Some(variant));
            }
            if !self.advance_frame()? {
                return Ok(None);
            }
        }
    }

    fn advance_frame(&mut self) -> Result<bool, SavError> {
        match &mut self.mode {
            Mode::Sequential { next_offset } => {
                if *next_offset >= self.mmap.len() as u64 {
                    return Ok(false);
                }
                let (decoded, consumed) = frame::decode_one_frame(&self.mmap[*next_offset as usize..])?;
                *next_offset += consumed as u64;
                self.frame = FrameCursor { bytes: decoded, pos: 0, records_left: None };
                Ok(true)
            }
            Mode::Indexed { queue } => {
                let Some(entry) = queue.pop_front() else { return Ok(false) };
                let (file_offset, records_in_frame) = s1r::LeafEntry::unpack_sav_value(entry.value);
                let (decoded, _consumed) = frame::decode_one_frame(&self.mmap[file_offset as usize..])?;
                self.frame = FrameCursor { bytes: decoded, pos: 0, records_left: Some(records_in_frame) };
                Ok(true)
            }
            Mode::Csi { chunks, current } => {
                loop {
                    if let Some((cursor, chunk_end)) = current {
                        if *cursor < *chunk_end && *cursor < self.mmap.len() as u64 {
                            let (decoded, consumed) = frame::decode_one_frame(&self.mmap[*cursor as usize..])?;
                            *cursor += consumed as u64;
                            self.frame = FrameCursor { bytes: decoded, pos: 0, records_left: None };
                            return Ok(true);
                        }
                        *current = None;
                        continue;
                    }
                    let Some(chunk) = chunks.pop_front() else { return Ok(false) };
                    *current = Some(chunk);
                }
            }
        }
    }

    fn apply_pbwt_decode(&mut self, variant: &mut Variant, reset: bool) -> Result<(), SavError> {
        for (key, value) in variant.format.iter_mut() {
            if !self.dictionary.pbwt_targets.contains(&(*key as u32)) {
                continue;
            }
            let dense = variant::dense_i64(value)?;
            let state = self.pbwt_states.entry(*key).or_insert_with(|| pbwt::PbwtState::identity(dense.len()));
            if reset && state.len() != dense.len() {
                *state = pbwt::PbwtState::identity(dense.len());
            } else if reset {
                state.reset();
            }
            let decoded = state.decode(&dense)?;
            *value = variant::rewrap_i64(value, decoded)?;
        }
        Ok(())
    }

    fn apply_sample_subset(&mut self, variant: &mut Variant) {
        let Some((sample_map, new_sample_count)) = &self.sample_subset else { return };
        let original_sample_count = self.header.samples.len() as u64;
        if original_sample_count == 0 {
            return;
        }
        for (_key, value) in variant.format.iter_mut() {
            let logical_len = value.logical_len();
            if logical_len == 0 || logical_len % original_sample_count != 0 {
                continue;
            }
            let ploidy = logical_len / original_sample_count;
            let (hap_map, new_len) = self
                .ploidy_cache
                .entry(ploidy)
                .or_insert_with(|| expand_index_map(sample_map, ploidy, *new_sample_count))
                .clone();
            *value = value.subset(&hap_map, new_len);
        }
    }

    fn matches_region(&self, variant: &Variant) -> bool {
        let Some((chrom_code, begin, end, bounding_point)) = &self.region else { return true };
        if variant.site.chrom_code != *chrom_code {
            return false;
        }
        bounding_point.matches(variant.site.pos_one_based(), variant.site.record_end(), *begin, *end)
    }
}

fn expand_index_map(sample_map: &[u64], ploidy: u64, new_sample_count: u64) -> (Vec<u64>, u64) {
    let mut out = Vec::with_capacity(sample_map.len() * ploidy as usize);
    for &dst in sample_map {
        for p in 0..ploidy {
            out.push(if dst == typed_value::SENTINEL { typed_value::SENTINEL } else { dst * ploidy + p });
        }
    }
    (out, new_sample_count * ploidy)
}
