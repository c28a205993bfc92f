use chrono::NaiveDate;

/// This is the standard way of converting a date to a record file name in daytally.
pub fn date_to_record_name(date: NaiveDate) -> String {
    format!("{}.txt", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::date_to_record_name;

    #[test]
    fn record_names_are_sortable_dates() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(date_to_record_name(date), "2025-03-07.txt");
    }
}
