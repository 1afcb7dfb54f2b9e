use super::scholarship::{Projection, ValidationError, parse_grade, project};

/// Where a chat is inside the scholarship calculator conversation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalculatorState {
    AwaitingMidTerm,
    AwaitingEndTerm { mid_term: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalculatorStep {
    /// Input accepted; ask for the next grade.
    Advanced(CalculatorState),
    /// Input rejected; ask again without changing state.
    Reprompt(CalculatorState, ValidationError),
    Done(Projection),
    Exit,
}

pub fn is_exit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("exit")
}

/// Feeds one message into the calculator.
pub fn advance(state: CalculatorState, input: &str) -> CalculatorStep {
    if is_exit(input) {
        return CalculatorStep::Exit;
    }
    let grade = match parse_grade(input) {
        Ok(grade) => grade,
        Err(e) => return CalculatorStep::Reprompt(state, e),
    };
    match state {
        CalculatorState::AwaitingMidTerm => {
            CalculatorStep::Advanced(CalculatorState::AwaitingEndTerm { mid_term: grade })
        }
        CalculatorState::AwaitingEndTerm { mid_term } => match project(mid_term, grade) {
            Ok(projection) => CalculatorStep::Done(projection),
            Err(e) => CalculatorStep::Reprompt(state, e),
        },
    }
}
