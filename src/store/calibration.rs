use std::fs;
use std::path::Path;
use crate::fetch::FetchError;
/// One line of a calibration file.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationEntry {
    pub pattern: String,
    /// `None` matches channels that declare no units.
    pub units: Option<String>,
    pub scale: f64,
}
/// Physical scale per signal type, looked up by channel name and units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationTable {
    entries: Vec<CalibrationEntry>,
}
impl CalibrationTable {
    /// Parses `pattern<TAB>low high type scale units` lines.
    ///
    /// Blank lines, `#` comments and lines with too few fields are skipped.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((pattern, rest)) = line.split_once('\t') else {
                log::debug!("calibration line {} has no tab, skipped", index + 1);
                continue;
            };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() < 5 {
                log::debug!("calibration line {} is incomplete, skipped", index + 1);
                continue;
            }
            let Ok(scale) = fields[3].parse::<f64>() else {
                log::debug!("calibration line {} has a bad scale, skipped", index + 1);
                continue;
            };
            let units = match fields[4] {
                "-" => None,
                u => Some(u.to_string()),
            };
            entries.push(CalibrationEntry {
                pattern: pattern.trim().trim_end_matches('*').to_string(),
                units,
                scale,
            });
        }
        Self { entries }
    }
    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let text = fs::read_to_string(path).map_err(|e| FetchError::io(path, e))?;
        let table = Self::parse(&text);
        log::debug!(
            "loaded {} calibration entries from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// First entry whose pattern prefixes `name` and whose units agree.
    pub fn lookup(&self, name: &str, units: Option<&str>) -> Option<&CalibrationEntry> {
        self.entries
            .iter()
            .find(|e| name.starts_with(e.pattern.as_str()) && e.units.as_deref() == units)
    }
}
