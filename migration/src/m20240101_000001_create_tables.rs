use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create playlists table
        manager
            .create_table(
                Table::create()
                    .table(Playlist::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Playlist::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Playlist::Title)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Playlist::Category).string().not_null())
                    .col(ColumnDef::new(Playlist::Duration).big_integer())
                    .col(ColumnDef::new(Playlist::Thumbnail).string())
                    .col(ColumnDef::new(Playlist::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Playlist::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Create tracks table
        manager
            .create_table(
                Table::create()
                    .table(Track::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Track::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Track::Title).string().not_null())
                    .col(ColumnDef::new(Track::TrackNumber).integer().not_null())
                    .col(ColumnDef::new(Track::AlbumTitle).string().not_null())
                    .col(ColumnDef::new(Track::AlbumYear).integer())
                    .col(ColumnDef::new(Track::ArtistName).string().not_null())
                    .col(ColumnDef::new(Track::Duration).big_integer())
                    .col(ColumnDef::new(Track::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Track::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Create episodes table
        manager
            .create_table(
                Table::create()
                    .table(Episode::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Episode::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Episode::Title).string().not_null())
                    .col(ColumnDef::new(Episode::EpisodeNumber).integer().not_null())
                    .col(ColumnDef::new(Episode::SeasonNumber).integer().not_null())
                    .col(ColumnDef::new(Episode::ShowTitle).string().not_null())
                    .col(ColumnDef::new(Episode::ShowYear).integer())
                    .col(ColumnDef::new(Episode::Duration).big_integer())
                    .col(ColumnDef::new(Episode::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Episode::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Create movies table
        manager
            .create_table(
                Table::create()
                    .table(Movie::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Movie::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Movie::Title).string().not_null())
                    .col(ColumnDef::new(Movie::Year).integer().not_null())
                    .col(ColumnDef::new(Movie::Duration).big_integer().not_null())
                    .col(ColumnDef::new(Movie::Thumbnail).string())
                    .col(ColumnDef::new(Movie::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Movie::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Create photos table
        manager
            .create_table(
                Table::create()
                    .table(Photo::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Photo::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Photo::Title).string().not_null())
                    .col(ColumnDef::new(Photo::Thumbnail).string().not_null())
                    .col(ColumnDef::new(Photo::FilePath).string().not_null())
                    .col(ColumnDef::new(Photo::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Photo::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Natural keys
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tracks_natural_key")
                    .table(Track::Table)
                    .col(Track::Title)
                    .col(Track::TrackNumber)
                    .col(Track::AlbumTitle)
                    .col(Track::ArtistName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_episodes_natural_key")
                    .table(Episode::Table)
                    .col(Episode::Title)
                    .col(Episode::EpisodeNumber)
                    .col(Episode::SeasonNumber)
                    .col(Episode::ShowTitle)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_movies_natural_key")
                    .table(Movie::Table)
                    .col(Movie::Title)
                    .col(Movie::Year)
                    .col(Movie::Duration)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_photos_natural_key")
                    .table(Photo::Table)
                    .col(Photo::Title)
                    .col(Photo::Thumbnail)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Junction tables, one per item category
        create_junction_table(manager, "playlist_tracks", "track_id", "tracks").await?;
        create_junction_table(manager, "playlist_episodes", "episode_id", "episodes").await?;
        create_junction_table(manager, "playlist_movies", "movie_id", "movies").await?;
        create_junction_table(manager, "playlist_photos", "photo_id", "photos").await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table("playlist_photos").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table("playlist_movies").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table("playlist_episodes").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table("playlist_tracks").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Photo::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Movie::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Episode::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Track::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Playlist::Table).to_owned())
            .await?;

        Ok(())
    }
}

/// Creates a `(playlist_id, <item>_id)` junction table with cascading foreign keys.
async fn create_junction_table(
    manager: &SchemaManager<'_>,
    table: &'static str,
    item_column: &'static str,
    item_table: &'static str,
) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(table)
                .if_not_exists()
                .col(ColumnDef::new("playlist_id").integer().not_null())
                .col(ColumnDef::new(item_column).integer().not_null())
                .col(ColumnDef::new("created_at").timestamp().not_null())
                .col(ColumnDef::new("updated_at").timestamp().not_null())
                .primary_key(Index::create().col("playlist_id").col(item_column))
                .foreign_key(
                    ForeignKey::create()
                        .name(format!("fk_{}_playlist_id", table))
                        .from(table, "playlist_id")
                        .to("playlists", "id")
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name(format!("fk_{}_{}", table, item_column))
                        .from(table, item_column)
                        .to(item_table, "id")
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name(format!("idx_{}_{}", table, item_column))
                .table(table)
                .col(item_column)
                .to_owned(),
        )
        .await
}

#[derive(DeriveIden)]
enum Playlist {
    #[sea_orm(iden = "playlists")]
    Table,
    Id,
    Title,
    Category,
    Duration,
    Thumbnail,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Track {
    #[sea_orm(iden = "tracks")]
    Table,
    Id,
    Title,
    #[allow(clippy::enum_variant_names)]
    TrackNumber,
    AlbumTitle,
    AlbumYear,
    ArtistName,
    Duration,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Episode {
    #[sea_orm(iden = "episodes")]
    Table,
    Id,
    Title,
    EpisodeNumber,
    SeasonNumber,
    ShowTitle,
    ShowYear,
    Duration,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Movie {
    #[sea_orm(iden = "movies")]
    Table,
    Id,
    Title,
    Year,
    Duration,
    Thumbnail,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Photo {
    #[sea_orm(iden = "photos")]
    Table,
    Id,
    Title,
    Thumbnail,
    FilePath,
    CreatedAt,
    UpdatedAt,
}
