use crate::common::*;

/// Variants of manifest file flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestFormat {
    /// One `<image_path> <id>` sample per line.
    Id,
    /// One `<image_path> <id> <color> <type>` sample per line.
    IdColorType,
}

impl Default for ManifestFormat {
    fn default() -> Self {
        Self::Id
    }
}

/// The parsed manifest line with an image path and labels.
///
/// Labels are one-indexed in manifest files and zero-indexed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestEntry {
    pub image_file: PathBuf,
    pub id: i64,
    pub color: Option<i64>,
    pub car_type: Option<i64>,
}

/// Parses a manifest file into a list of entries.
///
/// Blank lines are skipped. Image files are not checked for existence; a
/// missing file fails at lookup time instead.
pub fn load_manifest(
    path: impl AsRef<Path>,
    format: ManifestFormat,
) -> Result<Vec<ManifestEntry>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest file '{}'", path.display()))?;

    let entries: Vec<_> = text
        .lines()
        .enumerate()
        .filter(|(_line_index, line)| !line.trim().is_empty())
        .map(|(line_index, line)| {
            parse_line(line, format).with_context(|| {
                format!(
                    "malformed line {} in manifest file '{}'",
                    line_index + 1,
                    path.display()
                )
            })
        })
        .try_collect()?;

    Ok(entries)
}

fn parse_line(line: &str, format: ManifestFormat) -> Result<ManifestEntry> {
    let mut tokens = line.split_whitespace();
    let mut next_field = |name: &str| {
        tokens
            .next()
            .ok_or_else(|| format_err!("missing {} field", name))
    };

    let image_file = PathBuf::from(next_field("image path")?);
    let id = parse_label(next_field("identity")?)?;
    let (color, car_type) = match format {
        ManifestFormat::Id => (None, None),
        ManifestFormat::IdColorType => {
            let color = parse_label(next_field("color")?)?;
            let car_type = parse_label(next_field("type")?)?;
            (Some(color), Some(car_type))
        }
    };

    Ok(ManifestEntry {
        image_file,
        id,
        color,
        car_type,
    })
}

fn parse_label(token: &str) -> Result<i64> {
    let label: i64 = token
        .parse()
        .with_context(|| format!("invalid label '{}'", token))?;
    Ok(label - 1)
}
