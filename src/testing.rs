use sqlx::PgPool;

use crate::Result;
use crate::catalog::qualified_name;

/// Staging fixture row for `staging_events`, covering the columns the
/// transforms read. Inserted directly because the warehouse-native bulk load
/// cannot execute against a plain Postgres test instance.
#[derive(Clone, Debug)]
pub struct EventFixture {
    pub artist: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub page: String,
    pub sessionid: Option<i32>,
    pub song: Option<String>,
    pub ts: i64,
    pub useragent: Option<String>,
    pub userid: Option<i32>,
}

impl Default for EventFixture {
    fn default() -> Self {
        Self {
            artist: None,
            firstname: None,
            lastname: None,
            gender: None,
            level: Some("free".to_string()),
            location: None,
            page: "NextSong".to_string(),
            sessionid: None,
            song: None,
            ts: 1_541_207_000_000,
            useragent: None,
            userid: None,
        }
    }
}

/// Staging fixture row for `staging_songs`.
#[derive(Clone, Debug)]
pub struct SongFixture {
    pub song_id: String,
    pub artist_id: String,
    pub artist_name: String,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub duration: f64,
    pub num_songs: i32,
    pub title: String,
    pub year: i32,
}

impl Default for SongFixture {
    fn default() -> Self {
        Self {
            song_id: "S1".to_string(),
            artist_id: "A1".to_string(),
            artist_name: "Artist X".to_string(),
            artist_location: None,
            artist_latitude: None,
            artist_longitude: None,
            duration: 200.0,
            num_songs: 1,
            title: "Test".to_string(),
            year: 2000,
        }
    }
}

pub async fn insert_event(pool: &PgPool, schema: &str, event: &EventFixture) -> Result<()> {
    let stmt = format!(
        "insert into {} (artist, firstname, lastname, gender, level, location, page, sessionid, song, ts, useragent, userid) \
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        qualified_name(schema, "staging_events")
    );
    sqlx::query(&stmt)
        .bind(event.artist.as_deref())
        .bind(event.firstname.as_deref())
        .bind(event.lastname.as_deref())
        .bind(event.gender.as_deref())
        .bind(event.level.as_deref())
        .bind(event.location.as_deref())
        .bind(&event.page)
        .bind(event.sessionid)
        .bind(event.song.as_deref())
        .bind(event.ts)
        .bind(event.useragent.as_deref())
        .bind(event.userid)
        .execute(pool)
        .await
        .map_err(|e| crate::Error::statement("insert staging event fixture", e))?;
    Ok(())
}

pub async fn insert_song(pool: &PgPool, schema: &str, song: &SongFixture) -> Result<()> {
    let stmt = format!(
        "insert into {} (song_id, artist_id, artist_name, artist_location, artist_latitude, artist_longitude, duration, num_songs, title, year) \
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        qualified_name(schema, "staging_songs")
    );
    sqlx::query(&stmt)
        .bind(&song.song_id)
        .bind(&song.artist_id)
        .bind(&song.artist_name)
        .bind(song.artist_location.as_deref())
        .bind(song.artist_latitude)
        .bind(song.artist_longitude)
        .bind(song.duration)
        .bind(song.num_songs)
        .bind(&song.title)
        .bind(song.year)
        .execute(pool)
        .await
        .map_err(|e| crate::Error::statement("insert staging song fixture", e))?;
    Ok(())
}

/// Counts rows in one pipeline table.
pub async fn count_rows(pool: &PgPool, schema: &str, table: &str) -> Result<i64> {
    let stmt = format!("select count(*) from {}", qualified_name(schema, table));
    sqlx::query_scalar(&stmt)
        .fetch_one(pool)
        .await
        .map_err(|e| crate::Error::statement("count rows", e))
}
