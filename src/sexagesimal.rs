// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Code for handling conversion to and from sexagesimal.

Hit tables carry the pointing as sexagesimal strings ("HHhMMmSS.ssss" for
right ascension, "+DDdMMmSS.ss" for declination); the scan metadata carries
them as floats. These helpers convert between the two.
 */

use thiserror::Error;

/// Format a right ascension in decimal arc-hours as "HHhMMmSS.sss".
pub fn archours_to_sexagesimal(raj: f64) -> String {
    let hours = raj.abs().trunc();
    let minutes = ((raj.abs() - hours) * 60.0).trunc();
    let seconds = ((raj.abs() - hours) * 60.0 - minutes) * 60.0;
    format!("{:02}h{:02}m{:06.3}s", hours as i64, minutes as i64, seconds)
}

/// Format a declination in decimal degrees as "+DDdMMmSS.ss".
pub fn degrees_to_sexagesimal(dej: f64) -> String {
    let sign = if dej < 0.0 { '-' } else { '+' };
    let degrees = dej.abs().trunc();
    let arcminutes = ((dej.abs() - degrees) * 60.0).trunc();
    let arcseconds = ((dej.abs() - degrees) * 60.0 - arcminutes) * 60.0;
    format!(
        "{}{:02}d{:02}m{:05.2}s",
        sign, degrees as i64, arcminutes as i64, arcseconds
    )
}

/// Convert a sexagesimal-formatted string in "hours minutes seconds" (e.g.
/// "17h45m40.041s") back to decimal arc-hours.
///
/// # Examples
///
/// ```
/// # use driftnet::sexagesimal::*;
/// # use approx::*;
/// # fn main() -> Result<(), SexagesimalError> {
/// let h = sexagesimal_hms_to_archours("17h45m40.041s")?;
/// assert_abs_diff_eq!(h, 17.761122, epsilon = 1e-6);
/// # Ok(())
/// # }
/// ```
pub fn sexagesimal_hms_to_archours(hms: &str) -> Result<f64, SexagesimalError> {
    let (h, m, s) = split_three(hms, 'h', 'm', 's')?;
    Ok(h + m / 60.0 + s / 3600.0)
}

/// Convert a sexagesimal-formatted string in "degrees minutes seconds" (e.g.
/// "-29d00m28.12s") back to decimal degrees.
pub fn sexagesimal_dms_to_degrees(dms: &str) -> Result<f64, SexagesimalError> {
    let (d, m, s) = split_three(dms, 'd', 'm', 's')?;
    let num = d.abs() + m / 60.0 + s / 3600.0;
    // The sign lives on the degrees field, which may be "-00".
    if dms.trim_start().starts_with('-') {
        Ok(-num)
    } else {
        Ok(num)
    }
}

fn split_three(
    s: &str,
    first: char,
    second: char,
    third: char,
) -> Result<(f64, f64, f64), SexagesimalError> {
    let mut split = s.split(first);
    let a = match split.next() {
        None => return Err(SexagesimalError::MissingDelimiter(first, s.to_string())),
        Some(a) => a.trim().parse()?,
    };

    let mut split = match split.next() {
        None => return Err(SexagesimalError::MissingDelimiter(second, s.to_string())),
        Some(rest) => rest.split(second),
    };
    let b = match split.next() {
        None => return Err(SexagesimalError::MissingDelimiter(second, s.to_string())),
        Some(b) => b.parse()?,
    };

    let mut split = match split.next() {
        None => return Err(SexagesimalError::MissingDelimiter(third, s.to_string())),
        Some(rest) => rest.split(third),
    };
    let c = match split.next() {
        None => return Err(SexagesimalError::MissingDelimiter(third, s.to_string())),
        Some(c) => c.parse()?,
    };

    Ok((a, b, c))
}

#[derive(Error, Debug)]
pub enum SexagesimalError {
    #[error("Missing '{0}' delimiter in sexagesimal string '{1}'")]
    MissingDelimiter(char, String),

    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),
}
