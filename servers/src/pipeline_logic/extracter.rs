use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use lib_runtime::{Producer, Service, ServiceContext, ServiceError};

use super::model::{properties, Row, ENTITY_ORDER_ROW, TYPE_ADD, TYPE_END_OF_STREAM};

/// Publishes every row of the CSV files found in `<data_dir>/source`, then
/// moves each file to `<data_dir>/source.bak`.
pub struct Extracter {
    producer: Arc<dyn Producer<Row>>,
    source_dir: PathBuf,
    backup_dir: PathBuf,
}

impl Extracter {
    pub fn new(producer: Arc<dyn Producer<Row>>, data_dir: &Path) -> anyhow::Result<Self> {
        let source_dir = data_dir.join("source");
        let backup_dir = data_dir.join("source.bak");
        for dir in [&source_dir, &backup_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(Self {
            producer,
            source_dir,
            backup_dir,
        })
    }

    async fn source_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.source_dir)
            .await
            .with_context(|| format!("Failed to list {}", self.source_dir.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn extract(&self, ctx: &ServiceContext, path: &Path) -> Result<usize, ServiceError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let rows = parse_csv(&text);
        for row in &rows {
            let props = properties(TYPE_ADD, Some(ENTITY_ORDER_ROW));
            ctx.guard(self.producer.send(row, props, Some(Utc::now()))).await??;
        }
        Ok(rows.len())
    }

    async fn archive(&self, path: &Path) -> anyhow::Result<()> {
        let Some(file_name) = path.file_name() else {
            return Ok(());
        };
        let target = self.backup_dir.join(file_name);
        tokio::fs::rename(path, &target)
            .await
            .with_context(|| format!("Failed to move {} to {}", path.display(), target.display()))
    }
}

impl Service for Extracter {
    fn run(&self, ctx: ServiceContext) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            let files = self.source_files().await?;
            info!("Found {} file(s) in {}", files.len(), self.source_dir.display());

            for path in files {
                let count = self.extract(&ctx, &path).await?;
                self.archive(&path).await?;
                info!("Extracted {} row(s) from {}", count, path.display());
            }

            let props = properties(TYPE_END_OF_STREAM, None);
            ctx.guard(self.producer.send(&Row::new(), props, Some(Utc::now()))).await??;
            debug!("End of stream sent");
            Ok(())
        })
    }
}

/// Reads a header line and the records under it. Blank lines are skipped.
pub fn parse_csv(text: &str) -> Vec<Row> {
    let mut lines = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());

    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let header = split_record(header);

    lines
        .enumerate()
        .map(|(index, line)| {
            let fields = split_record(line);
            if fields.len() != header.len() {
                warn!(
                    "Record {} has {} field(s), header has {}",
                    index + 1,
                    fields.len(),
                    header.len()
                );
            }
            let row: Row = header.iter().cloned().zip(fields).collect();
            row
        })
        .collect()
}

/// Splits one record on commas. A field wrapped in double quotes may contain
/// commas, and `""` inside it is a literal quote.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if field.is_empty() => quoted = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }
    fields.push(field);
    fields
}
