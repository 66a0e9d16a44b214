use crate::models::Interval;

// Scanner column suffix per interval; the daily column carries none
pub fn column_suffix(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "|1",
        Interval::FiveMinutes => "|5",
        Interval::FifteenMinutes => "|15",
        Interval::ThirtyMinutes => "|30",
        Interval::OneHour => "|60",
        Interval::TwoHours => "|120",
        Interval::FourHours => "|240",
        Interval::OneDay => "",
        Interval::OneWeek => "|1W",
        Interval::OneMonth => "|1M",
    }
}

pub fn recommend_column(interval: Interval) -> String {
    format!("Recommend.All{}", column_suffix(interval))
}

/// Converts the scanner's overall rating (-1.0..=1.0) into a recommendation label.
pub fn recommendation_from_value(value: f64) -> &'static str {
    if value >= -1.0 && value < -0.5 {
        "STRONG_SELL"
    } else if value >= -0.5 && value < -0.1 {
        "SELL"
    } else if value >= -0.1 && value <= 0.1 {
        "NEUTRAL"
    } else if value > 0.1 && value <= 0.5 {
        "BUY"
    } else if value > 0.5 && value <= 1.0 {
        "STRONG_BUY"
    } else {
        "ERROR"
    }
}
