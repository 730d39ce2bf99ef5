//! Sample catalog and borrowers for an empty store

use super::{books::BooksService, users::UsersService};
use crate::{
    error::AppResult,
    models::{book::BookInput, user::UserInput},
};

const AUTHORS: [&str; 10] = [
    "Kim Young-ha", "Han Kang", "Park Min-gyu", "Jeong You-jeong", "Kim Hoon",
    "Yi Mun-yol", "Gong Ji-young", "Shin Kyung-sook", "Eun Hee-kyung", "Kim Ae-ran",
];

const PUBLISHERS: [&str; 5] = ["Munhakdongne", "Changbi", "Minumsa", "Eunhaengnamu", "Openbooks"];

const SHELVES: [(&str, &[&str]); 3] = [
    (
        "programming",
        &["Clean Code", "Effective Java", "Refactoring", "Design Patterns", "Algorithm Strategies"],
    ),
    (
        "literature",
        &["The Vegetarian", "Human Acts", "Diary of a Murderer", "The Good Son", "Please Look After Mom"],
    ),
    (
        "self-development",
        &["The One Thing", "The Power of Habit", "Mindset", "Grit", "Flow"],
    ),
];

const FIRST_NAMES: [&str; 10] = [
    "Minsu", "Younghee", "Cheolsu", "Sunhee", "Hyunwoo",
    "Jiyoung", "Seungho", "Miyoung", "Donghyun", "Sujin",
];

const LAST_NAMES: [&str; 5] = ["Kim", "Lee", "Park", "Choi", "Jung"];

const CITIES: [&str; 5] = ["Seoul", "Busan", "Daegu", "Incheon", "Daejeon"];

pub const SAMPLE_USERS: usize = 20;

/// Populate the catalog when it is empty. Returns whether anything was written.
pub async fn seed_if_empty(books: &BooksService, users: &UsersService) -> AppResult<bool> {
    if books.count().await? > 0 {
        tracing::info!("Catalog already populated, skipping sample data");
        return Ok(false);
    }

    let mut created = 0;
    for input in sample_books() {
        books.create(input).await?;
        created += 1;
    }
    for input in sample_users() {
        users.create(input).await?;
    }

    tracing::info!(books = created, users = SAMPLE_USERS, "Sample data created");
    Ok(true)
}

fn sample_books() -> Vec<BookInput> {
    let mut index = 0usize;
    let mut books = Vec::new();
    for (shelf_no, (shelf, titles)) in SHELVES.iter().enumerate() {
        for title in titles.iter() {
            index += 1;
            books.push(BookInput {
                name: title.to_string(),
                author: AUTHORS[index % AUTHORS.len()].to_string(),
                isbn: Some(format!("978-89-{:04}-{:03}-{}", index, shelf_no + 1, index % 10)),
                description: Some(format!("{} from the {} shelf.", title, shelf)),
                publisher: Some(PUBLISHERS[index % PUBLISHERS.len()].to_string()),
                publish_year: Some(2015 + (index % 9) as i32),
            });
        }
    }
    books
}

fn sample_users() -> Vec<UserInput> {
    (1..=SAMPLE_USERS)
        .map(|i| {
            let first = FIRST_NAMES[i % FIRST_NAMES.len()];
            let last = LAST_NAMES[i % LAST_NAMES.len()];
            UserInput {
                name: format!("{} {}", first, last),
                email: format!("{}.{}{}@example.com", first, last, i).to_lowercase(),
                phone: Some(format!("010-{:04}-{:04}", 1000 + i, 1000 + i * 2)),
                address: Some(format!("{} {}-ro {}", CITIES[i % CITIES.len()], last, i * 10)),
            }
        })
        .collect()
}
