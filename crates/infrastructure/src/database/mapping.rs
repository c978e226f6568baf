//! 行到实体的映射
//!
//! 时间统一存为固定宽度的 RFC 3339 UTC 文本（微秒精度，`Z` 结尾），文本顺序即时间顺序。

use chrono::{DateTime, SecondsFormat, Utc};
use jobmesh_domain::{Job, JobDetail, JobQueueItem, JobResult};
use jobmesh_errors::{MeshError, MeshResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn format_timestamp(value: DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse_timestamp(row: &SqliteRow, field_name: &str) -> MeshResult<DateTime<Utc>> {
        let text: String = row.try_get(field_name)?;
        Self::parse_timestamp_text(&text, field_name)
    }

    pub fn parse_optional_timestamp(
        row: &SqliteRow,
        field_name: &str,
    ) -> MeshResult<Option<DateTime<Utc>>> {
        let text: Option<String> = row.try_get(field_name)?;
        text.map(|text| Self::parse_timestamp_text(&text, field_name))
            .transpose()
    }

    fn parse_timestamp_text(text: &str, field_name: &str) -> MeshResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|e| MeshError::Serialization(format!("解析时间字段 {field_name} 失败: {e}")))
    }

    pub fn parse_uuid(row: &SqliteRow, field_name: &str) -> MeshResult<Uuid> {
        let text: String = row.try_get(field_name)?;
        Uuid::parse_str(&text)
            .map_err(|e| MeshError::Serialization(format!("解析作业ID失败 {text}: {e}")))
    }

    pub fn row_to_queue_item(row: &SqliteRow) -> MeshResult<JobQueueItem> {
        Ok(JobQueueItem {
            job_id: Self::parse_uuid(row, "job_id")?,
            name: row.try_get("name")?,
            serialized: row.try_get("serialized")?,
            job_type: row.try_get("job_type")?,
            created_by: row.try_get("created_by")?,
            created: Self::parse_timestamp(row, "created")?,
        })
    }

    pub fn row_to_job(row: &SqliteRow) -> MeshResult<Job> {
        let result: Option<String> = row.try_get("result")?;
        Ok(Job {
            job_id: Self::parse_uuid(row, "job_id")?,
            name: row.try_get("name")?,
            serialized: row.try_get("serialized")?,
            job_type: row.try_get("job_type")?,
            created_by: row.try_get("created_by")?,
            created: Self::parse_timestamp(row, "created")?,
            started: Self::parse_timestamp(row, "started")?,
            ended: Self::parse_optional_timestamp(row, "ended")?,
            result: result.map(|r| r.parse::<JobResult>()).transpose()?,
            sent_to_worker_node: row.try_get("sent_to_worker_node")?,
        })
    }

    pub fn row_to_detail(row: &SqliteRow) -> MeshResult<JobDetail> {
        Ok(JobDetail {
            id: row.try_get("id")?,
            job_id: Self::parse_uuid(row, "job_id")?,
            detail: row.try_get("detail")?,
            created: Self::parse_timestamp(row, "created")?,
        })
    }
}
