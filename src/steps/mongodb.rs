//! MongoDB steps. Collections live in the `dbfunc` test database.

use cucumber::gherkin::Step;
use cucumber::{given, then, when};
use mongodb::bson::{doc, Document};

use super::{table_records, DbWorld, StepError};

/// `{ field: value }` with a runtime field name.
fn field_equals(field: &str, value: &str) -> Document {
    let mut document = Document::new();
    document.insert(field, value);
    document
}

#[given(expr = "an empty mongodb collection {string}")]
async fn empty_collection(world: &mut DbWorld, collection: String) -> Result<(), StepError> {
    drop_collection(world, collection).await
}

#[when(expr = "I insert a document with {word} {string} into collection {string}")]
async fn insert_document(
    world: &mut DbWorld,
    field: String,
    value: String,
    collection: String,
) -> Result<(), StepError> {
    let value = world.interpolate(&value);
    let db = world.mongodb().await?;
    db.collection::<Document>(&collection)
        .insert_one(field_equals(&field, &value))
        .await?;
    Ok(())
}

/// One document per table row, header cells are field names.
#[when(expr = "I insert documents into collection {string}:")]
async fn insert_documents(
    world: &mut DbWorld,
    collection: String,
    step: &Step,
) -> Result<(), StepError> {
    let documents: Vec<Document> = table_records(world, step)?
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .fold(Document::new(), |mut document, (field, value)| {
                    document.insert(field, value);
                    document
                })
        })
        .collect();
    if documents.is_empty() {
        return Ok(());
    }

    let db = world.mongodb().await?;
    db.collection::<Document>(&collection)
        .insert_many(documents)
        .await?;
    Ok(())
}

#[when(expr = "I drop collection {string}")]
async fn drop_collection(world: &mut DbWorld, collection: String) -> Result<(), StepError> {
    let db = world.mongodb().await?;
    db.collection::<Document>(&collection).drop().await?;
    Ok(())
}

#[then(expr = "collection {string} has {int} documents")]
async fn count_documents(
    world: &mut DbWorld,
    collection: String,
    expected: u64,
) -> Result<(), StepError> {
    let db = world.mongodb().await?;
    let actual = db
        .collection::<Document>(&collection)
        .count_documents(doc! {})
        .await?;
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::failed(format!(
            "collection '{}' has {} documents, expected {}",
            collection, actual, expected
        )))
    }
}

#[then(expr = "collection {string} contains a document with {word} {string}")]
async fn contains_document(
    world: &mut DbWorld,
    collection: String,
    field: String,
    value: String,
) -> Result<(), StepError> {
    let value = world.interpolate(&value);
    let db = world.mongodb().await?;
    let found = db
        .collection::<Document>(&collection)
        .find_one(field_equals(&field, &value))
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(StepError::failed(format!(
            "collection '{}' has no document with {} = '{}'",
            collection, field, value
        ))),
    }
}
