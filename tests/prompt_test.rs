use playdex::error::PromptError;
use playdex::prompt::{confirm, Menu, Picked, ScriptedTerminal, Terminal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Accept,
    More,
    Skip,
    Edit,
    Quit,
}

fn review_menu() -> Menu<Action> {
    Menu::new(&[
        ("Accept", Action::Accept),
        ("More candidates", Action::More),
        ("Skip", Action::Skip),
        ("Edit", Action::Edit),
        ("Quit", Action::Quit),
    ])
    .unwrap()
}

// --- Letter assignment ---

#[test]
fn letters_are_unique_first_letters() {
    assert_eq!(review_menu().letters(), vec!['a', 'm', 's', 'e', 'q']);
}

#[test]
fn colliding_first_letters_use_a_later_letter() {
    let menu = Menu::new(&[("Skip", 1), ("Search", 2), ("save", 3)]).unwrap();
    assert_eq!(menu.letters(), vec!['s', 'e', 'a']);
}

#[test]
fn explicit_uppercase_letter_wins() {
    let menu = Menu::new(&[("Apply", 1), ("continue Editing", 2), ("Cancel", 3)]).unwrap();
    assert_eq!(menu.letters(), vec!['a', 'e', 'c']);
}

#[test]
fn option_without_free_letter_is_a_construction_error() {
    let result = Menu::new(&[("ab", 1), ("ba", 2), ("Ab", 3)]);
    assert!(matches!(result, Err(PromptError::NoUnambiguousLetter(label)) if label == "Ab"));
}

#[test]
fn empty_menu_is_rejected() {
    let result = Menu::<u8>::new(&[]);
    assert!(matches!(result, Err(PromptError::Empty)));
}

#[test]
fn unknown_default_is_rejected() {
    let result = review_menu().with_default("Nope");
    assert!(matches!(result, Err(PromptError::UnknownDefault(_))));
}

// --- Asking ---

#[test]
fn letters_are_case_insensitive() {
    let mut terminal = ScriptedTerminal::new(["E"]);
    assert_eq!(review_menu().ask(&mut terminal).unwrap(), Action::Edit);
}

#[test]
fn enter_picks_first_option_by_default() {
    let mut terminal = ScriptedTerminal::new([""]);
    assert_eq!(review_menu().ask(&mut terminal).unwrap(), Action::Accept);
    assert_eq!(
        terminal.prompts()[0],
        "> [A]ccept, More candidates, Skip, Edit, Quit?"
    );
}

#[test]
fn explicit_default_moves_the_brackets() {
    let menu = review_menu().with_default("Skip").unwrap();
    let mut terminal = ScriptedTerminal::new([""]);

    assert_eq!(menu.ask(&mut terminal).unwrap(), Action::Skip);
    assert_eq!(
        terminal.prompts()[0],
        "> Accept, More candidates, [S]kip, Edit, Quit?"
    );
}

#[test]
fn invalid_answer_reprompts_with_letter_list() {
    let mut terminal = ScriptedTerminal::new(["x", "q"]);

    assert_eq!(review_menu().ask(&mut terminal).unwrap(), Action::Quit);
    assert_eq!(terminal.prompts()[1], "Enter one of A, M, S, E, Q:");
}

#[test]
fn default_can_sit_on_a_later_letter_of_the_label() {
    let menu = Menu::new(&[("Apply", 1), ("continue Editing", 2), ("Cancel", 3)])
        .unwrap()
        .with_default("continue Editing")
        .unwrap();
    let mut terminal = ScriptedTerminal::new([""]);

    assert_eq!(menu.ask(&mut terminal).unwrap(), 2);
    assert_eq!(terminal.prompts()[0], "> Apply, continue [E]diting, Cancel?");
}

#[test]
fn end_of_input_is_an_error() {
    let mut terminal = ScriptedTerminal::new(Vec::<String>::new());
    let err = review_menu().ask(&mut terminal).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

// --- Numbers ---

#[test]
fn number_picks_zero_based_index() {
    let menu = Menu::new(&[("Skip", 's'), ("Quit", 'q')]).unwrap();
    let mut terminal = ScriptedTerminal::new(["3"]);

    assert_eq!(
        menu.ask_with_numbers(&mut terminal, 3, None).unwrap(),
        Picked::Number(2)
    );
}

#[test]
fn out_of_range_number_reprompts() {
    let menu = Menu::new(&[("Skip", 's'), ("Quit", 'q')]).unwrap();
    let mut terminal = ScriptedTerminal::new(["0", "4", "q"]);

    assert_eq!(
        menu.ask_with_numbers(&mut terminal, 3, None).unwrap(),
        Picked::Option('q')
    );
    assert_eq!(terminal.prompts()[1], "Enter 1-3 or one of S, Q:");
}

#[test]
fn default_number_overrides_menu_default() {
    let menu = Menu::new(&[("Skip", 's'), ("Quit", 'q')]).unwrap();
    let mut terminal = ScriptedTerminal::new([""]);

    assert_eq!(
        menu.ask_with_numbers(&mut terminal, 3, Some(2)).unwrap(),
        Picked::Number(1)
    );
    assert_eq!(terminal.prompts()[0], "> Select 1-3 [2] or Skip, Quit?");
}

#[test]
fn enter_without_default_number_uses_menu_default() {
    let menu = Menu::new(&[("Skip", 's'), ("Quit", 'q')]).unwrap();
    let mut terminal = ScriptedTerminal::new([""]);

    assert_eq!(
        menu.ask_with_numbers(&mut terminal, 2, None).unwrap(),
        Picked::Option('s')
    );
    assert_eq!(terminal.prompts()[0], "> Select 1-2 or [S]kip, Quit?");
}

// --- Confirm ---

#[test]
fn confirm_accepts_default_and_explicit_answers() {
    let mut terminal = ScriptedTerminal::new(["", "no", "YES", "maybe", "n"]);

    assert!(confirm(&mut terminal, "Apply? (Y/n)", true).unwrap());
    assert!(!confirm(&mut terminal, "Apply? (Y/n)", true).unwrap());
    assert!(confirm(&mut terminal, "Apply? (y/N)", false).unwrap());
    assert!(!confirm(&mut terminal, "Apply? (y/N)", false).unwrap());
    assert!(terminal.prompts().iter().any(|p| p == "> Enter Y or N:"));
}

#[test]
fn scripted_terminal_captures_output() {
    let mut terminal = ScriptedTerminal::new(Vec::<String>::new());
    terminal.say("Hello");
    assert!(terminal.printed("Hell"));
    assert_eq!(terminal.output(), &["Hello".to_string()]);
}
