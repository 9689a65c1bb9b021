#![allow(dead_code)]

use rusqlite::Connection;
use std::path::Path;

pub mod integration;
pub mod utils;

/// A small Chinook-shaped database: every table the default group layout
/// reads, with just enough rows to exercise lookups, embeds and null keys.
const CHINOOK_FIXTURE: &str = r#"
    CREATE TABLE Artist (ArtistId INTEGER PRIMARY KEY, Name TEXT);
    CREATE TABLE Album (
        AlbumId INTEGER PRIMARY KEY,
        Title TEXT NOT NULL,
        ArtistId INTEGER NOT NULL REFERENCES Artist(ArtistId)
    );
    CREATE TABLE Genre (GenreId INTEGER PRIMARY KEY, Name TEXT);
    CREATE TABLE MediaType (MediaTypeId INTEGER PRIMARY KEY, Name TEXT);
    CREATE TABLE Track (
        TrackId INTEGER PRIMARY KEY,
        Name TEXT NOT NULL,
        AlbumId INTEGER REFERENCES Album(AlbumId),
        MediaTypeId INTEGER NOT NULL REFERENCES MediaType(MediaTypeId),
        GenreId INTEGER REFERENCES Genre(GenreId),
        Milliseconds INTEGER NOT NULL,
        UnitPrice REAL NOT NULL
    );
    CREATE TABLE Employee (
        EmployeeId INTEGER PRIMARY KEY,
        LastName TEXT NOT NULL,
        FirstName TEXT NOT NULL,
        ReportsTo INTEGER REFERENCES Employee(EmployeeId)
    );
    CREATE TABLE Customer (
        CustomerId INTEGER PRIMARY KEY,
        FirstName TEXT NOT NULL,
        LastName TEXT NOT NULL,
        Email TEXT NOT NULL,
        SupportRepId INTEGER REFERENCES Employee(EmployeeId)
    );
    CREATE TABLE Invoice (
        InvoiceId INTEGER PRIMARY KEY,
        CustomerId INTEGER NOT NULL REFERENCES Customer(CustomerId),
        Total REAL NOT NULL
    );
    CREATE TABLE InvoiceLine (
        InvoiceLineId INTEGER PRIMARY KEY,
        InvoiceId INTEGER NOT NULL REFERENCES Invoice(InvoiceId),
        TrackId INTEGER NOT NULL REFERENCES Track(TrackId),
        UnitPrice REAL NOT NULL,
        Quantity INTEGER NOT NULL
    );
    CREATE TABLE Playlist (PlaylistId INTEGER PRIMARY KEY, Name TEXT);
    CREATE TABLE PlaylistTrack (
        PlaylistId INTEGER NOT NULL REFERENCES Playlist(PlaylistId),
        TrackId INTEGER NOT NULL REFERENCES Track(TrackId),
        PRIMARY KEY (PlaylistId, TrackId)
    );

    INSERT INTO Artist VALUES (1, 'AC/DC'), (2, 'Accept');
    INSERT INTO Album VALUES
        (1, 'For Those About To Rock', 1),
        (2, 'Balls to the Wall', 2),
        (3, 'Let There Be Rock', 1);
    INSERT INTO Genre VALUES (1, 'Rock');
    INSERT INTO MediaType VALUES (1, 'MPEG audio file');
    INSERT INTO Track VALUES
        (1, 'For Those About To Rock', 1, 1, 1, 343719, 0.99),
        (2, 'Balls to the Wall', 2, 1, 1, 342562, 0.99),
        (3, 'Go Down', 3, 1, 1, 331180, 0.99),
        (4, 'Loose Track', NULL, 1, NULL, 200000, 0.99);
    INSERT INTO Employee VALUES
        (1, 'Adams', 'Andrew', NULL),
        (2, 'Edwards', 'Nancy', 1),
        (3, 'Peacock', 'Jane', 2);
    INSERT INTO Customer VALUES
        (1, 'Luis', 'Goncalves', 'Luisg@Embraer.com.br', 3),
        (2, 'Leonie', 'Kohler', 'leonekohler@surfeu.de', 3);
    INSERT INTO Invoice VALUES (1, 2, 1.98), (2, 1, 3.96), (3, 2, 0.99);
    INSERT INTO InvoiceLine VALUES
        (1, 1, 1, 0.99, 1),
        (2, 1, 2, 0.99, 1),
        (3, 2, 1, 0.99, 2),
        (4, 2, 3, 0.99, 2),
        (5, 3, 4, 0.99, 1);
    INSERT INTO Playlist VALUES (1, 'Music'), (2, 'Grunge');
    INSERT INTO PlaylistTrack VALUES (1, 1), (1, 3), (2, 2);
"#;

/// Items the default layout produces from the fixture, per group.
pub const CHINOOK_MUSIC_ITEMS: u64 = 9;
pub const CHINOOK_CUSTOMER_ITEMS: u64 = 5;
pub const CHINOOK_PLAYLIST_ITEMS: u64 = 5;
pub const CHINOOK_EMPLOYEE_ITEMS: u64 = 3;

/// Creates the fixture database at `path`.
pub fn seed_chinook(path: &Path) {
    let conn = Connection::open(path).expect("create fixture database");
    conn.execute_batch(CHINOOK_FIXTURE)
        .expect("seed fixture database");
}
