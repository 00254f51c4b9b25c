use std::path::Path;

use lazy_static::lazy_static;

use crate::errors::CatalogError;
use crate::experience::Experience;
use crate::normalization::normalize;

const BUNDLED_JSON: &str = include_str!("../data/experiences.json");

lazy_static! {
    static ref BUNDLED: Vec<Experience> = parse(BUNDLED_JSON).unwrap_or_default();
}

/// Returns the catalog compiled into the binary.
pub fn bundled() -> Vec<Experience> {
    BUNDLED.clone()
}

/// Reads a seed catalog from a JSON file.
pub async fn read_file(path: impl AsRef<Path>) -> Result<Vec<Experience>, CatalogError> {
    let path = path.as_ref();

    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CatalogError::io(path, e))?;

    parse(&raw)
}

fn parse(raw: &str) -> Result<Vec<Experience>, CatalogError> {
    let experiences: Vec<Experience> = serde_json::from_str(raw)?;

    Ok(experiences.into_iter().map(normalize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_parses() {
        let experiences = bundled();

        assert_eq!(experiences.len(), 4);
        assert_eq!(experiences.iter().filter(|e| e.enabled).count(), 3);
        assert!(experiences
            .iter()
            .all(|e| !e.translations.en.title.is_empty() && !e.translations.it.title.is_empty()));
    }

    #[tokio::test]
    async fn seed_files_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"[{"id":7,"translations":{"en":{"title":"A"},"it":{"title":"B"}},"price":"0.04","maxPeople":"10"}]"#,
        )
        .unwrap();

        let experiences = read_file(&path).await.unwrap();

        assert_eq!(experiences[0].id, "7");
        assert_eq!(experiences[0].price, 0.04);
        assert_eq!(experiences[0].max_people, 10);
    }

    #[tokio::test]
    async fn missing_seed_file_is_an_error() {
        let result = read_file("/definitely/not/here.json").await;

        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
