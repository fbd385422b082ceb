//! Redis steps.

use cucumber::gherkin::Step;
use cucumber::{given, then, when};
use redis::AsyncCommands;

use super::{table_records, DbWorld, StepError};

#[given("an empty redis database")]
async fn empty_database(world: &mut DbWorld) -> Result<(), StepError> {
    flush_database(world).await
}

#[when("I flush the redis database")]
async fn flush_database(world: &mut DbWorld) -> Result<(), StepError> {
    let mut conn = world.redis().await?;
    let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
    Ok(())
}

#[when(expr = "I set redis key {string} to {string}")]
async fn set_key(world: &mut DbWorld, key: String, value: String) -> Result<(), StepError> {
    let key = world.interpolate(&key);
    let value = world.interpolate(&value);
    let mut conn = world.redis().await?;
    let _: () = conn.set(key, value).await?;
    Ok(())
}

/// Table columns `key` and `value`, one key per row.
#[when("I set redis keys:")]
async fn set_keys(world: &mut DbWorld, step: &Step) -> Result<(), StepError> {
    let records = table_records(world, step)?;
    let mut pairs = Vec::with_capacity(records.len());
    for record in records {
        let column = |name: &str| {
            record
                .iter()
                .find(|(header, _)| header == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| StepError::failed(format!("table has no '{}' column", name)))
        };
        pairs.push((column("key")?, column("value")?));
    }
    if pairs.is_empty() {
        return Ok(());
    }

    let mut conn = world.redis().await?;
    let _: () = conn.mset(&pairs[..]).await?;
    Ok(())
}

#[when(expr = "I delete redis key {string}")]
async fn delete_key(world: &mut DbWorld, key: String) -> Result<(), StepError> {
    let key = world.interpolate(&key);
    let mut conn = world.redis().await?;
    let _: i64 = conn.del(key).await?;
    Ok(())
}

#[then(expr = "redis key {string} has value {string}")]
async fn key_has_value(world: &mut DbWorld, key: String, expected: String) -> Result<(), StepError> {
    let key = world.interpolate(&key);
    let expected = world.interpolate(&expected);
    let mut conn = world.redis().await?;
    let actual: Option<String> = conn.get(&key).await?;
    match actual {
        Some(value) if value == expected => Ok(()),
        Some(value) => Err(StepError::failed(format!(
            "key '{}' has value '{}', expected '{}'",
            key, value, expected
        ))),
        None => Err(StepError::failed(format!("key '{}' does not exist", key))),
    }
}

#[then(expr = "redis key {string} does not exist")]
async fn key_is_missing(world: &mut DbWorld, key: String) -> Result<(), StepError> {
    let key = world.interpolate(&key);
    let mut conn = world.redis().await?;
    let exists: bool = conn.exists(&key).await?;
    if exists {
        Err(StepError::failed(format!("key '{}' exists", key)))
    } else {
        Ok(())
    }
}

#[then(expr = "the redis database has {int} keys")]
async fn database_size(world: &mut DbWorld, expected: u64) -> Result<(), StepError> {
    let mut conn = world.redis().await?;
    let actual: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::failed(format!(
            "database has {} keys, expected {}",
            actual, expected
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::steps::world::tests::attached;

    #[tokio::test]
    async fn test_steps_fail_on_mongodb_run() {
        let mut world = attached(Backend::Mongodb, Some("mongodb://localhost:27017"));
        let err = database_size(&mut world, 0).await.unwrap_err();
        assert!(matches!(err, StepError::WrongBackend { .. }));
        let err = delete_key(&mut world, "a".to_string()).await.unwrap_err();
        assert!(matches!(err, StepError::WrongBackend { .. }));
    }

    #[tokio::test]
    async fn test_steps_fail_when_detached() {
        let mut world = DbWorld::new();
        assert!(matches!(
            flush_database(&mut world).await,
            Err(StepError::Detached)
        ));
    }
}
