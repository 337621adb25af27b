use crate::fixtures::{FixtureNode, GroupDef, Round, Slot, TournamentConfig};

const GROUPS: [(char, [&str; 4]); 12] = [
    ('A', ["Mexico", "South Africa", "South Korea", "UEFA Playoff D"]),
    ('B', ["Canada", "UEFA Playoff A", "Qatar", "Switzerland"]),
    ('C', ["Brazil", "Morocco", "Haiti", "Scotland"]),
    ('D', ["USA", "Paraguay", "Australia", "UEFA Playoff C"]),
    ('E', ["Germany", "Curaçao", "Côte d'Ivoire", "Ecuador"]),
    ('F', ["Netherlands", "Japan", "UEFA Playoff B", "Tunisia"]),
    ('G', ["Belgium", "Egypt", "Iran", "New Zealand"]),
    ('H', ["Spain", "Cape Verde", "Saudi Arabia", "Uruguay"]),
    ('I', ["France", "Senegal", "Intercontinental Playoff 2", "Norway"]),
    ('J', ["Argentina", "Algeria", "Austria", "Jordan"]),
    ('K', ["Portugal", "Intercontinental Playoff 1", "Uzbekistan", "Colombia"]),
    ('L', ["England", "Croatia", "Ghana", "Panama"]),
];

const ARLINGTON: &str = "AT&T Stadium, Arlington";
const ATLANTA: &str = "Mercedes-Benz Stadium, Atlanta";
const BOSTON: &str = "Gillette Stadium, Foxborough";
const HOUSTON: &str = "NRG Stadium, Houston";
const KANSAS_CITY: &str = "Arrowhead Stadium, Kansas City";
const LOS_ANGELES: &str = "SoFi Stadium, Inglewood";
const MEXICO_CITY: &str = "Estadio Azteca, Mexico City";
const MIAMI: &str = "Hard Rock Stadium, Miami Gardens";
const MONTERREY: &str = "Estadio BBVA, Monterrey";
const NEW_YORK: &str = "MetLife Stadium, East Rutherford";
const PHILADELPHIA: &str = "Lincoln Financial Field, Philadelphia";
const SF_BAY: &str = "Levi's Stadium, Santa Clara";
const SEATTLE: &str = "Lumen Field, Seattle";
const TORONTO: &str = "BMO Field, Toronto";
const VANCOUVER: &str = "BC Place, Vancouver";

/// 2026 men's World Cup: 12 groups of 4 and knockout matches 73-104.
pub fn world_cup_2026() -> TournamentConfig {
    let groups = GROUPS
        .iter()
        .map(|(id, teams)| GroupDef {
            id: *id,
            teams: teams.iter().map(|t| t.to_string()).collect(),
        })
        .collect();

    use Round::*;
    let fixtures = vec![
        node(73, RoundOf32, LOS_ANGELES, second('A'), second('B')),
        node(74, RoundOf32, BOSTON, first('E'), third("ABCDF")),
        node(75, RoundOf32, MONTERREY, first('F'), second('C')),
        node(76, RoundOf32, HOUSTON, first('C'), second('F')),
        node(77, RoundOf32, NEW_YORK, first('I'), third("CDFGH")),
        node(78, RoundOf32, ARLINGTON, second('E'), second('I')),
        node(79, RoundOf32, MEXICO_CITY, first('A'), third("CEFHI")),
        node(80, RoundOf32, ATLANTA, first('L'), third("EHIJK")),
        node(81, RoundOf32, SF_BAY, first('D'), third("BEFIJ")),
        node(82, RoundOf32, SEATTLE, first('G'), third("AEHIJ")),
        node(83, RoundOf32, TORONTO, second('K'), second('L')),
        node(84, RoundOf32, LOS_ANGELES, first('H'), second('J')),
        node(85, RoundOf32, VANCOUVER, first('B'), third("EFGIJ")),
        node(86, RoundOf32, MIAMI, first('J'), second('H')),
        node(87, RoundOf32, KANSAS_CITY, first('K'), third("DEIJL")),
        node(88, RoundOf32, ARLINGTON, second('D'), second('G')),
        node(89, RoundOf16, PHILADELPHIA, winner(74), winner(77)),
        node(90, RoundOf16, HOUSTON, winner(73), winner(75)),
        node(91, RoundOf16, NEW_YORK, winner(76), winner(78)),
        node(92, RoundOf16, MEXICO_CITY, winner(79), winner(80)),
        node(93, RoundOf16, ARLINGTON, winner(83), winner(84)),
        node(94, RoundOf16, SEATTLE, winner(81), winner(82)),
        node(95, RoundOf16, ATLANTA, winner(86), winner(88)),
        node(96, RoundOf16, VANCOUVER, winner(85), winner(87)),
        node(97, QuarterFinal, BOSTON, winner(89), winner(90)),
        node(98, QuarterFinal, LOS_ANGELES, winner(93), winner(94)),
        node(99, QuarterFinal, MIAMI, winner(91), winner(92)),
        node(100, QuarterFinal, KANSAS_CITY, winner(95), winner(96)),
        node(101, SemiFinal, ARLINGTON, winner(97), winner(98)),
        node(102, SemiFinal, ATLANTA, winner(99), winner(100)),
        node(103, ThirdPlace, MIAMI, loser(101), loser(102)),
        node(104, Final, NEW_YORK, winner(101), winner(102)),
    ];

    TournamentConfig {
        name: "FIFA World Cup 2026".to_string(),
        groups,
        fixtures,
    }
}

fn node(number: u32, round: Round, venue: &str, home: Slot, away: Slot) -> FixtureNode {
    FixtureNode {
        number,
        round,
        venue: venue.to_string(),
        home,
        away,
    }
}

fn first(group: char) -> Slot {
    Slot::GroupWinner { group }
}

fn second(group: char) -> Slot {
    Slot::GroupRunnerUp { group }
}

fn third(pool: &str) -> Slot {
    Slot::BestThird {
        pool: pool.chars().collect(),
    }
}

fn winner(fixture: u32) -> Slot {
    Slot::WinnerOf { fixture }
}

fn loser(fixture: u32) -> Slot {
    Slot::LoserOf { fixture }
}
