use csv::{ReaderBuilder, WriterBuilder};

use crate::{
    artifact::{ArtifactError, FIELD_NAMES, TrackRecord},
    domain::track::{RankedRow, RawRow},
};

/// Serializes ranked rows into a CSV payload.
///
/// The header comes from the record's field names. An empty batch still
/// yields a header line, so downstream readers always get a parseable file.
pub fn write_rows(rows: &[RankedRow]) -> Result<Vec<u8>, ArtifactError> {
    let mut writer = WriterBuilder::new()
        .has_headers(!rows.is_empty())
        .from_writer(Vec::new());

    if rows.is_empty() {
        writer.write_record(FIELD_NAMES)?;
    }
    for row in rows {
        writer.serialize(TrackRecord::from(row))?;
    }

    writer
        .into_inner()
        .map_err(|e| ArtifactError::Flush(e.error().to_string()))
}

/// Reads an artifact payload back into records
pub fn read_records(payload: &[u8]) -> Result<Vec<TrackRecord>, ArtifactError> {
    ReaderBuilder::new()
        .from_reader(payload)
        .deserialize()
        .collect::<Result<Vec<TrackRecord>, _>>()
        .map_err(ArtifactError::from)
}

/// Reads raw catalog rows from CSV. Unknown columns are ignored, missing ones stay empty.
pub fn read_raw_rows<R: std::io::Read>(input: R) -> Result<Vec<RawRow>, ArtifactError> {
    ReaderBuilder::new()
        .from_reader(input)
        .deserialize()
        .collect::<Result<Vec<RawRow>, _>>()
        .map_err(ArtifactError::from)
}
