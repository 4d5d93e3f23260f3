use serde::{Deserialize, Serialize};

/// One installed program as recorded in `ppt.json`.
///
/// The program name is the manifest key and is not repeated inside the
/// serialized record. Field names match the files the tool has always written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRecord {
    #[serde(skip)]
    pub name: String,
    pub owner: String,
    pub repo: String,
    pub version: String,
    #[serde(rename = "url", alias = "source_url")]
    pub source_url: String,
    #[serde(rename = "filename", alias = "asset_filename")]
    pub asset_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<String>,
}

impl PackageRecord {
    /// Returns the name of the first required field that is empty.
    pub fn first_empty_field(&self) -> Option<&'static str> {
        [
            ("name", &self.name),
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("version", &self.version),
            ("url", &self.source_url),
            ("filename", &self.asset_filename),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }
}

/// Installed programs keyed by name, in the order they appear on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    packages: Vec<PackageRecord>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserts or replaces the record keyed by `record.name`, returning the
    /// previous record. A replaced record keeps its position.
    pub fn insert(&mut self, record: PackageRecord) -> Option<PackageRecord> {
        match self.packages.iter_mut().find(|p| p.name == record.name) {
            Some(slot) => Some(std::mem::replace(slot, record)),
            None => {
                self.packages.push(record);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<PackageRecord> {
        let index = self.packages.iter().position(|p| p.name == name)?;
        Some(self.packages.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.iter()
    }

    /// Parses the on-disk document: a JSON object mapping program names to
    /// records.
    pub fn from_json(content: &str) -> Result<Self, String> {
        let document: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let mut manifest = Manifest::default();
        for (name, value) in document {
            let mut record: PackageRecord = serde_json::from_value(value)
                .map_err(|e| format!("record '{}': {}", name, e))?;
            record.name = name;
            if let Some(field) = record.first_empty_field() {
                return Err(format!("record '{}' has an empty '{}' field", record.name, field));
            }
            manifest.packages.push(record);
        }
        Ok(manifest)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut document = serde_json::Map::new();
        for record in &self.packages {
            document.insert(record.name.clone(), serde_json::to_value(record)?);
        }
        serde_json::to_string_pretty(&document)
    }
}

/// Name/version pair produced by `list`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListedPackage {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubRelease {
    pub tag_name: String,
}
