use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::error::{Result, WfdbError};

/// 解析WFDB基准时间 `HH:MM:SS[.fff]`（也接受 `MM:SS[.fff]`）
pub fn parse_base_time(s: &str) -> Result<NaiveTime> {
    let invalid = || WfdbError::type_error("basetime", s);
    let s = s.trim();

    let (clock, fraction) = match s.find('.') {
        Some(dot) => (&s[..dot], &s[dot + 1..]),
        None => (s, ""),
    };

    let parts = clock
        .split(':')
        .map(|p| p.parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<Vec<u32>>>()?;
    let (hour, minute, second) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(invalid()),
    };

    // 小数部分最多保留9位（纳秒）
    let nanos = if fraction.is_empty() {
        0
    } else if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    } else {
        let digits = &fraction[..fraction.len().min(9)];
        let value = digits.parse::<u32>().map_err(|_| invalid())?;
        value * 10u32.pow(9 - digits.len() as u32)
    };

    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).ok_or_else(invalid)
}

/// 解析WFDB基准日期 `DD/MM/YYYY`
pub fn parse_base_date(s: &str) -> Result<NaiveDate> {
    let invalid = || WfdbError::type_error("basedate", s);

    let parts = s
        .trim()
        .split('/')
        .map(|p| p.parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<Vec<u32>>>()?;
    match parts.as_slice() {
        [day, month, year] => {
            NaiveDate::from_ymd_opt(*year as i32, *month, *day).ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

/// Formats a base time the way header files carry it
pub fn format_base_time(time: &NaiveTime) -> String {
    let clock = format!("{:02}:{:02}:{:02}", time.hour(), time.minute(), time.second());
    match time.nanosecond() {
        0 => clock,
        nanos => {
            let fraction = format!("{:09}", nanos);
            format!("{}.{}", clock, fraction.trim_end_matches('0'))
        }
    }
}

pub fn format_base_date(date: &NaiveDate) -> String {
    format!("{:02}/{:02}/{:04}", date.day(), date.month(), date.year())
}
