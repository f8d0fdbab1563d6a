// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The TurboSETI-compatible `.dat` hit table: a `#`-prefixed header block
//! followed by one tab-separated row per hit, numbered from 1.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use log::warn;
use regex::Regex;

use super::HitsFileError;
use crate::constants::SECONDS_PER_DAY;
use crate::data::{Hit, RfiCounts, Scan, ScanMetadata};
use crate::sexagesimal::{
    archours_to_sexagesimal, degrees_to_sexagesimal, sexagesimal_dms_to_degrees,
    sexagesimal_hms_to_archours,
};

lazy_static::lazy_static! {
    static ref POINTING_REGEX: Regex =
        Regex::new(r"^#\s+MJD:\s+(\S+)\s+RA:\s+(\S+)s\s+DEC:\s+(\S+)").unwrap();
    static ref RESOLUTION_REGEX: Regex = Regex::new(
        r"^#\s+DELTAT:\s+(\S+)\s+DELTAF\(Hz\):\s+(\S+)\s+max_drift_rate:\s+(\S+)\s+obs_length:\s+(\S+)",
    )
    .unwrap();
    static ref SOURCE_REGEX: Regex = Regex::new(r"^#\s+Source:(.*)$").unwrap();
    static ref DATA_REGEX: Regex = Regex::new(
        r"^(\d+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(-?\d+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(-?\d+)\s+(\d+)\s*$",
    )
    .unwrap();
}

/// Everything a `.dat` file carries: the header metadata and the hit rows.
#[derive(Debug, Clone)]
pub struct DatContents {
    pub metadata: ScanMetadata,
    pub max_drift_rate: f64,
    pub obs_length_sec: f64,
    pub hits: Vec<Hit>,
}

/// Write a scan's hits as a `.dat` table.
///
/// `max_drift_rate` \[Hz/s\] is recorded in the header; TurboSETI consumers
/// use it to reconstruct the searched range.
pub fn write_scan_hits_to_dat_file(
    scan_with_hits: &mut Scan,
    file_path: impl AsRef<Path>,
    max_drift_rate: f64,
) -> Result<(), HitsFileError> {
    let hits = scan_with_hits.hits()?;
    let meta = scan_with_hits.metadata().clone();

    let formatted_raj = archours_to_sexagesimal(meta.src_raj.unwrap_or(0.0));
    let formatted_dej = degrees_to_sexagesimal(meta.src_dej.unwrap_or(0.0));

    let mut out = File::create(file_path)?;
    write!(
        out,
        "# -------------------------- o --------------------------\n\
         # File ID: {}\n\
         # -------------------------- o --------------------------\n\
         # Source:{}\n\
         # MJD: {}\tRA: {}s\tDEC: {}\n\
         # DELTAT: {:.6}\tDELTAF(Hz): {:.6}\tmax_drift_rate: {}\tobs_length: {:.2}\n\
         # --------------------------\n\
         # Top_Hit_#\tDrift_Rate\tSNR\tUncorrected_Frequency\tCorrected_Frequency\tIndex\t\
         freq_start\tfreq_end\tSEFD\tSEFD_freq\tCoarse_Channel_Number\tFull_number_of_hits\n\
         # --------------------------\n",
        scan_with_hits.file_path(),
        meta.source_name,
        meta.tstart,
        formatted_raj,
        formatted_dej,
        meta.tsamp,
        meta.foff * 1e6,
        max_drift_rate,
        scan_with_hits.tduration_secs(),
    )?;

    let full_number_of_hits = hits.len();
    for (nth, hit) in hits.iter().enumerate() {
        let start_freq = hit.start_freq_mhz;
        let end_freq = hit.end_freq_mhz();
        let mid_freq = (start_freq + end_freq) / 2.0;
        writeln!(
            out,
            "{:06}\t{:.4}\t{:.2}\t{:.6}\t{:.6}\t{}\t{:.6}\t{:.6}\t{:.1}\t{:.1}\t{}\t{}",
            nth + 1,
            hit.drift_rate_hz_per_sec,
            hit.snr,
            mid_freq,
            // Without a barycentric correction the corrected frequency is
            // the uncorrected one.
            mid_freq,
            hit.start_freq_index,
            start_freq,
            end_freq,
            0.0,
            0.0,
            hit.coarse_channel_number,
            full_number_of_hits,
        )?;
    }
    Ok(())
}

/// Parse a `.dat` table back into its header metadata and hits.
///
/// Only the fields a `.dat` row carries are restored; the rest of each hit
/// is zeroed.
pub fn read_hits_from_dat_file(file_path: impl AsRef<Path>) -> Result<DatContents, HitsFileError> {
    let mut metadata = ScanMetadata::default();
    let mut max_drift_rate = 0.0;
    let mut obs_length_sec = 0.0;
    let mut hits = vec![];

    let reader = BufReader::new(File::open(&file_path)?);
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(captures) = POINTING_REGEX.captures(&line) {
            metadata.tstart = parse_field(&captures[1], line_number, &line)?;
            metadata.src_raj = Some(sexagesimal_hms_to_archours(&captures[2])?);
            metadata.src_dej = Some(sexagesimal_dms_to_degrees(&captures[3])?);
        } else if let Some(captures) = RESOLUTION_REGEX.captures(&line) {
            metadata.tsamp = parse_field(&captures[1], line_number, &line)?;
            metadata.foff = parse_field::<f64>(&captures[2], line_number, &line)? / 1e6;
            max_drift_rate = parse_field(&captures[3], line_number, &line)?;
            obs_length_sec = parse_field(&captures[4], line_number, &line)?;
        } else if let Some(captures) = SOURCE_REGEX.captures(&line) {
            metadata.source_name = captures[1].trim().to_string();
        } else if let Some(captures) = DATA_REGEX.captures(&line) {
            hits.push(Hit {
                start_freq_index: parse_field(&captures[6], line_number, &line)?,
                start_freq_mhz: parse_field(&captures[7], line_number, &line)?,
                start_time_sec: metadata.tstart * SECONDS_PER_DAY,
                duration_sec: obs_length_sec,
                rate_index: 0,
                drift_rate_hz_per_sec: parse_field(&captures[2], line_number, &line)?,
                power: 0.0,
                time_span_steps: 0,
                integrated_channels: 0,
                snr: parse_field(&captures[3], line_number, &line)?,
                bandwidth_hz: 0.0,
                binwidth: 0,
                rfi_counts: RfiCounts::default(),
                coarse_channel_number: parse_field(&captures[11], line_number, &line)?,
            });
        } else if !line.starts_with('#') && !line.trim().is_empty() {
            warn!("Skipping unrecognised dat line {line_number}: '{line}'");
        }
    }

    if metadata.tsamp != 0.0 {
        metadata.ntsteps = (obs_length_sec / metadata.tsamp).round() as i64;
    }
    Ok(DatContents {
        metadata,
        max_drift_rate,
        obs_length_sec,
        hits,
    })
}

fn parse_field<T: std::str::FromStr>(
    field: &str,
    line_number: usize,
    line: &str,
) -> Result<T, HitsFileError> {
    field.parse().map_err(|_| HitsFileError::MalformedLine {
        line_number,
        line: line.to_string(),
    })
}
