use crate::types::{Job, JobOutcome};
use ::redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

/// Redis queue semantics shared by the worker and the CLI.
/// Keeps key names in one place so producers and consumers never drift.

pub const QUEUE_KEY: &str = "judge:queue";
pub const RESULT_PREFIX: &str = "judge:result";

/// Results are kept for 24 hours.
pub const RESULT_TTL_SECONDS: u64 = 86_400;

/// Result key for a job
pub fn result_key(job_id: &Uuid) -> String {
    format!("{}:{}", RESULT_PREFIX, job_id)
}

fn encode_error(e: serde_json::Error) -> ::redis::RedisError {
    ::redis::RedisError::from((
        ::redis::ErrorKind::TypeError,
        "serialization error",
        e.to_string(),
    ))
}

fn decode_error(e: serde_json::Error) -> ::redis::RedisError {
    ::redis::RedisError::from((
        ::redis::ErrorKind::TypeError,
        "deserialization error",
        e.to_string(),
    ))
}

/// Push a job to the submission queue (RPUSH, FIFO)
pub async fn push_job(conn: &mut ::redis::aio::ConnectionManager, job: &Job) -> RedisResult<()> {
    let payload = serde_json::to_string(job).map_err(encode_error)?;
    conn.rpush(QUEUE_KEY, payload).await
}

/// Pop a job from the submission queue.
/// BLPOP with a timeout so the caller can notice shutdown between polls.
pub async fn pop_job(
    conn: &mut ::redis::aio::ConnectionManager,
    timeout_seconds: f64,
) -> RedisResult<Option<Job>> {
    let popped: Option<(String, String)> = conn.blpop(QUEUE_KEY, timeout_seconds).await?;

    match popped {
        Some((_key, payload)) => {
            let job: Job = serde_json::from_str(&payload).map_err(decode_error)?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Store a finished job with the standard TTL
pub async fn store_result(
    conn: &mut ::redis::aio::ConnectionManager,
    outcome: &JobOutcome,
) -> RedisResult<()> {
    let key = result_key(&outcome.job_id);
    let payload = serde_json::to_string(outcome).map_err(encode_error)?;
    let _: () = conn.set_ex(&key, payload, RESULT_TTL_SECONDS as _).await?;
    Ok(())
}

/// Fetch a finished job, `None` while it is still queued or running
pub async fn get_result(
    conn: &mut ::redis::aio::ConnectionManager,
    job_id: &Uuid,
) -> RedisResult<Option<JobOutcome>> {
    let payload: Option<String> = conn.get(result_key(job_id)).await?;

    match payload {
        Some(data) => {
            let outcome: JobOutcome = serde_json::from_str(&data).map_err(decode_error)?;
            Ok(Some(outcome))
        }
        None => Ok(None),
    }
}
