use anyhow::Result;
use chrono::{Datelike, NaiveDateTime, Timelike};
use songlift::{
    Pipeline,
    testing::{self, EventFixture, SongFixture},
};
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

async fn start_postgres() -> Result<(ContainerAsync<GenericImage>, String)> {
    let image = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", "postgres")
        .with_env_var("POSTGRES_PASSWORD", "postgres");

    let container = image.start().await?;
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres?sslmode=disable");
    Ok((container, url))
}

#[tokio::test]
async fn end_to_end_scenario_populates_every_table() -> Result<()> {
    let (_container, url) = start_postgres().await?;
    let pipeline = Pipeline::connect(&url).await?;
    pipeline.setup_schema().await?;

    let event = EventFixture {
        artist: Some("Artist X".to_string()),
        firstname: Some("Ada".to_string()),
        lastname: Some("Lovelace".to_string()),
        gender: Some("F".to_string()),
        level: Some("free".to_string()),
        location: Some("NY".to_string()),
        page: "NextSong".to_string(),
        sessionid: Some(100),
        song: Some("Test".to_string()),
        ts: 1_541_207_000_000,
        useragent: Some("UA".to_string()),
        userid: Some(7),
    };
    testing::insert_event(pipeline.pool(), pipeline.schema(), &event).await?;
    testing::insert_song(pipeline.pool(), pipeline.schema(), &SongFixture::default()).await?;

    pipeline.transform().run().await?;

    let expected_start = chrono::DateTime::from_timestamp(1_541_207_000, 0)
        .unwrap()
        .naive_utc();

    let plays: Vec<(NaiveDateTime, i32, String, String, String, i32, String, String)> =
        sqlx::query_as(
            "select start_time, user_id, level, song_id, artist_id, session_id, location, user_agent from songplays",
        )
        .fetch_all(pipeline.pool())
        .await?;
    assert_eq!(plays.len(), 1);
    let play = &plays[0];
    assert_eq!(play.0, expected_start);
    assert_eq!(play.1, 7);
    assert_eq!(play.2, "free");
    assert_eq!(play.3, "S1");
    assert_eq!(play.4, "A1");
    assert_eq!(play.5, 100);
    assert_eq!(play.6, "NY");
    assert_eq!(play.7, "UA");

    let times: Vec<(NaiveDateTime, i32, i32, i32, i32, i32, i32)> = sqlx::query_as(
        "select start_time, hour, day, week, month, year, weekday from \"time\"",
    )
    .fetch_all(pipeline.pool())
    .await?;
    assert_eq!(times.len(), 1);
    let time = &times[0];
    assert_eq!(time.0, expected_start);
    assert_eq!(time.1, expected_start.hour() as i32);
    assert_eq!(time.2, expected_start.day() as i32);
    assert_eq!(time.3, expected_start.iso_week().week() as i32);
    assert_eq!(time.4, expected_start.month() as i32);
    assert_eq!(time.5, expected_start.year());
    assert_eq!(time.6, expected_start.weekday().num_days_from_sunday() as i32);

    let songs: Vec<(String, String)> =
        sqlx::query_as("select song_id, artist_id from songs")
            .fetch_all(pipeline.pool())
            .await?;
    assert_eq!(songs, vec![("S1".to_string(), "A1".to_string())]);

    let artists: Vec<(String, String)> =
        sqlx::query_as("select artist_id, name from artists")
            .fetch_all(pipeline.pool())
            .await?;
    assert_eq!(artists, vec![("A1".to_string(), "Artist X".to_string())]);

    let users: Vec<(i32, String, String)> =
        sqlx::query_as("select user_id, first_name, level from users")
            .fetch_all(pipeline.pool())
            .await?;
    assert_eq!(
        users,
        vec![(7, "Ada".to_string(), "free".to_string())]
    );

    Ok(())
}

#[tokio::test]
async fn user_dimension_reflects_most_recent_event() -> Result<()> {
    let (_container, url) = start_postgres().await?;
    let pipeline = Pipeline::connect(&url).await?;
    pipeline.setup_schema().await?;

    let t1 = 1_541_207_000_000;
    let t2 = t1 + 60_000;
    testing::insert_event(
        pipeline.pool(),
        pipeline.schema(),
        &EventFixture {
            userid: Some(42),
            level: Some("free".to_string()),
            ts: t1,
            ..Default::default()
        },
    )
    .await?;
    testing::insert_event(
        pipeline.pool(),
        pipeline.schema(),
        &EventFixture {
            userid: Some(42),
            level: Some("paid".to_string()),
            ts: t2,
            ..Default::default()
        },
    )
    .await?;

    pipeline.transform().run().await?;

    let users: Vec<(i32, String)> = sqlx::query_as("select user_id, level from users")
        .fetch_all(pipeline.pool())
        .await?;
    assert_eq!(users, vec![(42, "paid".to_string())]);

    Ok(())
}

#[tokio::test]
async fn non_playback_events_yield_no_fact_or_time_rows() -> Result<()> {
    let (_container, url) = start_postgres().await?;
    let pipeline = Pipeline::connect(&url).await?;
    pipeline.setup_schema().await?;

    // Artist and title match a staged song, but the page is not a playback.
    testing::insert_event(
        pipeline.pool(),
        pipeline.schema(),
        &EventFixture {
            artist: Some("Artist X".to_string()),
            song: Some("Test".to_string()),
            page: "Home".to_string(),
            userid: Some(7),
            ..Default::default()
        },
    )
    .await?;
    testing::insert_song(pipeline.pool(), pipeline.schema(), &SongFixture::default()).await?;

    pipeline.transform().run().await?;

    assert_eq!(
        testing::count_rows(pipeline.pool(), pipeline.schema(), "songplays").await?,
        0
    );
    assert_eq!(
        testing::count_rows(pipeline.pool(), pipeline.schema(), "time").await?,
        0
    );
    assert_eq!(
        testing::count_rows(pipeline.pool(), pipeline.schema(), "users").await?,
        0
    );

    Ok(())
}

#[tokio::test]
async fn duplicate_song_ids_are_not_merged() -> Result<()> {
    let (_container, url) = start_postgres().await?;
    let pipeline = Pipeline::connect(&url).await?;
    pipeline.setup_schema().await?;

    testing::insert_song(pipeline.pool(), pipeline.schema(), &SongFixture::default()).await?;
    testing::insert_song(
        pipeline.pool(),
        pipeline.schema(),
        &SongFixture {
            title: "Test (Remastered)".to_string(),
            ..Default::default()
        },
    )
    .await?;

    pipeline.transform().run().await?;

    assert_eq!(
        testing::count_rows(pipeline.pool(), pipeline.schema(), "songs").await?,
        2
    );

    Ok(())
}

#[tokio::test]
async fn rerunning_transforms_duplicates_fact_rows() -> Result<()> {
    let (_container, url) = start_postgres().await?;
    let pipeline = Pipeline::connect(&url).await?;
    pipeline.setup_schema().await?;

    testing::insert_event(
        pipeline.pool(),
        pipeline.schema(),
        &EventFixture {
            artist: Some("Artist X".to_string()),
            song: Some("Test".to_string()),
            userid: Some(7),
            ..Default::default()
        },
    )
    .await?;
    testing::insert_song(pipeline.pool(), pipeline.schema(), &SongFixture::default()).await?;

    pipeline.transform().run().await?;
    assert_eq!(
        testing::count_rows(pipeline.pool(), pipeline.schema(), "songplays").await?,
        1
    );

    // No truncate in between: the fact insert runs again and duplicates its
    // rows, then the users key conflict aborts the remaining statements.
    let rerun = pipeline.transform().run().await;
    assert!(rerun.is_err());
    assert_eq!(
        testing::count_rows(pipeline.pool(), pipeline.schema(), "songplays").await?,
        2
    );

    Ok(())
}
