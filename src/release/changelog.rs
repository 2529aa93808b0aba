use chrono::NaiveDate;

pub const CHANGELOG_MARKER: &str = "<!-- CHANGELOG:INSERT -->";

pub fn entry_line(version: &str, date: NaiveDate) -> String {
    format!("### v{} – {}", version, date.format("%Y-%m-%d"))
}

/// Adds the release heading right below the marker. Without a marker a
/// `## Changelog` section is put in front of the document.
pub fn insert_entry(readme: &str, version: &str, date: NaiveDate) -> String {
    let line = entry_line(version, date);
    match readme.find(CHANGELOG_MARKER) {
        Some(at) => {
            let split = at + CHANGELOG_MARKER.len();
            format!("{}\n{}{}", &readme[..split], line, &readme[split..])
        },
        None => format!("## Changelog\n\n{}\n\n{}", line, readme),
    }
}
