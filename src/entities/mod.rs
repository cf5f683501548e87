pub mod episode;
pub mod movie;
pub mod photo;
pub mod playlist;
pub mod playlist_episode;
pub mod playlist_movie;
pub mod playlist_photo;
pub mod playlist_track;
pub mod track;
