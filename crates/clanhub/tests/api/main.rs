mod bingo_routes_test;
mod bounty_routes_test;
mod clan_routes_test;
mod helpers;
mod system_routes_test;
