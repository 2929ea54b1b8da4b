pub mod initial_plan;
pub mod name_and_goals;
pub mod next_ability;
