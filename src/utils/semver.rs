//! Minimal `major.minor.patch` handling. Pre-release and build suffixes are
//! not understood; a component counts only its leading digits.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

fn component(part: &str) -> u64 {
    let digits: String = part.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Splits a version into three numeric parts; missing or non-numeric parts are 0.
pub fn parse_triplet(version: &str) -> [u64; 3] {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let mut parts = [0u64; 3];
    for (slot, part) in parts.iter_mut().zip(trimmed.split('.')) {
        *slot = component(part);
    }
    parts
}

/// Left-to-right comparison of the first three components.
pub fn cmp_semver(a: &str, b: &str) -> Ordering {
    parse_triplet(a).cmp(&parse_triplet(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
}

impl BumpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpKind::Major => "major",
            BumpKind::Minor => "minor",
            BumpKind::Patch => "patch",
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpKind {
    type Err = std::convert::Infallible;

    /// `m`/`major` and `i`/`minor` select those; every other answer is a patch.
    fn from_str(answer: &str) -> Result<Self, Self::Err> {
        Ok(match answer.trim().to_lowercase().as_str() {
            "m" | "major" => BumpKind::Major,
            "i" | "minor" => BumpKind::Minor,
            _ => BumpKind::Patch,
        })
    }
}

pub fn bump(version: &str, kind: BumpKind) -> String {
    let [major, minor, patch] = parse_triplet(version);
    match kind {
        BumpKind::Major => format!("{}.0.0", major + 1),
        BumpKind::Minor => format!("{}.{}.0", major, minor + 1),
        BumpKind::Patch => format!("{}.{}.{}", major, minor, patch + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_component_wise() {
        assert_eq!(cmp_semver("1.2.0", "1.2"), Ordering::Equal);
        assert_eq!(cmp_semver("2.0.0", "1.9.9"), Ordering::Greater);
        assert_eq!(cmp_semver("1.9.9", "2.0.0"), Ordering::Less);
        assert_eq!(cmp_semver("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(cmp_semver("v1.2.3", "1.2.3"), Ordering::Equal);
    }

    #[test]
    fn garbage_components_are_zero() {
        assert_eq!(parse_triplet("x.y.z"), [0, 0, 0]);
        assert_eq!(parse_triplet("1.2.3-beta.4"), [1, 2, 3]);
        assert_eq!(parse_triplet("3"), [3, 0, 0]);
        assert_eq!(parse_triplet(""), [0, 0, 0]);
        assert_eq!(cmp_semver("1.0.0.9", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn bump_rules() {
        assert_eq!(bump("1.4.9", BumpKind::Patch), "1.4.10");
        assert_eq!(bump("1.4.9", BumpKind::Minor), "1.5.0");
        assert_eq!(bump("1.4.9", BumpKind::Major), "2.0.0");
        assert_eq!(bump("v0.9", BumpKind::Patch), "0.9.1");
        assert_eq!(bump("abc", BumpKind::Minor), "0.1.0");
    }

    #[test]
    fn bump_answers() {
        assert_eq!("m".parse::<BumpKind>().unwrap(), BumpKind::Major);
        assert_eq!(" Minor ".parse::<BumpKind>().unwrap(), BumpKind::Minor);
        assert_eq!("i".parse::<BumpKind>().unwrap(), BumpKind::Minor);
        assert_eq!("".parse::<BumpKind>().unwrap(), BumpKind::Patch);
        assert_eq!("whatever".parse::<BumpKind>().unwrap(), BumpKind::Patch);
    }
}
