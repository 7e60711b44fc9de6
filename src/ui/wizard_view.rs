//! The deployment wizard screen: one dialog walked through in fixed step
//! order, rendering the step the wizard state machine is currently on.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::ui::fields::FormField;
use crate::validation::{parse_solc_output, SolcContract};
use crate::wizard::{InputType, Outcome, Step, Wizard};

/// What the screen asks the app to do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    /// Close the wizard (and the app).
    Close,
    /// The parameter step was submitted; start the deployment.
    StartDeployment,
}

/// Identifies a focusable field on the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldId {
    Name,
    Description,
    Owner,
    InputType,
    Abi,
    Code,
    SolcOutput,
    ContractPick,
    Param(usize),
}

/// Widget state for the wizard dialog. The authoritative values live in the
/// `Wizard`; this struct only holds cursor and focus state.
pub struct WizardScreen {
    focus: usize,
    name: FormField,
    description: FormField,
    owner: FormField,
    input_type: FormField,
    abi: FormField,
    code: FormField,
    solc_output: FormField,
    contract_pick: FormField,
    solc_contracts: Vec<SolcContract>,
    solc_error: Option<String>,
    params: Vec<FormField>,
}

impl WizardScreen {
    pub fn new(wizard: &Wizard) -> Self {
        let owner_labels = wizard.accounts().iter().map(|a| a.label()).collect();
        let type_labels = InputType::all()
            .iter()
            .map(|t| t.label().to_string())
            .collect();

        let mut abi = FormField::text_area("paste the contract abi json");
        abi.set_value(&wizard.abi);
        let mut code = FormField::text_area("paste the compiled bytecode hex");
        code.set_value(&wizard.code);

        let mut screen = Self {
            focus: 0,
            name: FormField::text_input("contract name"),
            description: FormField::text_area("contract description (optional)"),
            owner: FormField::select(owner_labels),
            input_type: FormField::select(type_labels),
            abi,
            code,
            solc_output: FormField::text_area("paste `solc --combined-json abi,bin` output"),
            contract_pick: FormField::select(Vec::new()),
            solc_contracts: Vec::new(),
            solc_error: None,
            params: Vec::new(),
        };
        screen.sync_params(wizard);
        screen
    }

    /// Focusable fields for the current step, in traversal order.
    fn fields_for(&self, wizard: &Wizard) -> Vec<FieldId> {
        let mut ids = Vec::new();
        match wizard.step() {
            Step::Details => {
                ids.push(FieldId::Name);
                ids.push(FieldId::Description);
                ids.push(FieldId::Owner);
            }
            Step::Parameters => {
                if !wizard.read_only {
                    ids.push(FieldId::InputType);
                    match wizard.input_type {
                        InputType::Manual => {
                            ids.push(FieldId::Abi);
                            ids.push(FieldId::Code);
                        }
                        InputType::Solc => {
                            ids.push(FieldId::SolcOutput);
                            if !self.solc_contracts.is_empty() {
                                ids.push(FieldId::ContractPick);
                            }
                        }
                    }
                }
                for i in 0..self.params.len() {
                    ids.push(FieldId::Param(i));
                }
            }
            Step::Deployment | Step::Completed => {}
        }
        ids
    }

    fn field_mut(&mut self, id: FieldId) -> &mut FormField {
        match id {
            FieldId::Name => &mut self.name,
            FieldId::Description => &mut self.description,
            FieldId::Owner => &mut self.owner,
            FieldId::InputType => &mut self.input_type,
            FieldId::Abi => &mut self.abi,
            FieldId::Code => &mut self.code,
            FieldId::SolcOutput => &mut self.solc_output,
            FieldId::ContractPick => &mut self.contract_pick,
            FieldId::Param(i) => &mut self.params[i],
        }
    }

    /// Push the focused field's value into the wizard, re-running its
    /// validator.
    fn apply_field(&mut self, id: FieldId, wizard: &mut Wizard) {
        match id {
            FieldId::Name => wizard.set_name(&self.name.value()),
            FieldId::Description => wizard.set_description(&self.description.value()),
            FieldId::Owner => {
                if let Some(i) = self.owner.selected_index() {
                    if let Some(account) = wizard.accounts().get(i) {
                        let address = account.address.clone();
                        wizard.set_from_address(address.as_str());
                    }
                }
            }
            FieldId::InputType => {
                if let Some(i) = self.input_type.selected_index() {
                    wizard.set_input_type(InputType::all()[i]);
                }
            }
            FieldId::Abi => {
                wizard.set_abi(&self.abi.value());
                self.sync_params(wizard);
            }
            FieldId::Code => wizard.set_code(&self.code.value()),
            FieldId::SolcOutput => self.reparse_solc(wizard),
            FieldId::ContractPick => self.apply_contract_pick(wizard),
            FieldId::Param(i) => wizard.set_param(i, self.params[i].value()),
        }
    }

    /// Re-extract contracts from the pasted solc output and refresh the
    /// picker.
    fn reparse_solc(&mut self, wizard: &mut Wizard) {
        match parse_solc_output(&self.solc_output.value()) {
            Ok(contracts) => {
                let labels = contracts.iter().map(|c| c.name.clone()).collect();
                self.contract_pick.set_options(labels);
                self.solc_contracts = contracts;
                self.solc_error = None;
                self.apply_contract_pick(wizard);
            }
            Err(err) => {
                self.solc_contracts.clear();
                self.contract_pick.set_options(Vec::new());
                self.solc_error = Some(err);
            }
        }
    }

    /// Load the picked contract's abi and bytecode into the wizard.
    fn apply_contract_pick(&mut self, wizard: &mut Wizard) {
        let Some(i) = self.contract_pick.selected_index() else {
            return;
        };
        let Some(contract) = self.solc_contracts.get(i) else {
            return;
        };
        let (abi, bin) = (contract.abi.clone(), contract.bin.clone());
        self.abi.set_value(&abi);
        self.code.set_value(&bin);
        wizard.set_abi(&abi);
        wizard.set_code(&bin);
        self.sync_params(wizard);
    }

    /// Rebuild the constructor value inputs after the abi (and so the
    /// constructor arity) changed, keeping already-entered values.
    fn sync_params(&mut self, wizard: &Wizard) {
        let labels: Vec<String> = wizard
            .parsed_abi()
            .map(|abi| {
                abi.constructor_params()
                    .iter()
                    .map(|p| format!("{} ({})", p.name, p.kind))
                    .collect()
            })
            .unwrap_or_default();

        let mut fields = Vec::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            let mut field = FormField::text_input(label.clone());
            if let Some(value) = wizard.params().get(i) {
                field.set_value(value);
            }
            fields.push(field);
        }
        self.params = fields;
    }

    pub fn handle_key(&mut self, key: KeyEvent, wizard: &mut Wizard) -> Option<ScreenAction> {
        match wizard.step() {
            Step::Details | Step::Parameters => self.handle_form_key(key, wizard),
            Step::Deployment => match key.code {
                // Both terminal failure views and the in-flight view close
                // the same way; an in-flight deployment keeps running.
                KeyCode::Esc | KeyCode::Char('q') => Some(ScreenAction::Close),
                KeyCode::Enter if wizard.outcome().is_some() => Some(ScreenAction::Close),
                _ => None,
            },
            Step::Completed => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => Some(ScreenAction::Close),
                _ => None,
            },
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent, wizard: &mut Wizard) -> Option<ScreenAction> {
        let fields = self.fields_for(wizard);

        match key.code {
            KeyCode::Esc => return Some(ScreenAction::Close),
            KeyCode::Tab => {
                if !fields.is_empty() {
                    self.focus = (self.focus + 1) % fields.len();
                }
                return None;
            }
            KeyCode::BackTab => {
                if !fields.is_empty() {
                    self.focus = self.focus.checked_sub(1).unwrap_or(fields.len() - 1);
                }
                return None;
            }
            _ => {}
        }

        let focused = fields.get(self.focus).copied();
        let in_textarea = match focused {
            Some(id) => self.field_mut(id).is_multiline(),
            None => false,
        };

        // Enter submits the step; inside a textarea only Ctrl+Enter does, so
        // plain Enter still inserts a newline.
        let submit = key.code == KeyCode::Enter
            && (!in_textarea || key.modifiers.contains(KeyModifiers::CONTROL));
        if submit {
            return self.submit_step(wizard);
        }

        if let Some(id) = focused {
            let changed = self.field_mut(id).handle_key(key);
            if changed {
                self.apply_field(id, wizard);
            }
        }
        None
    }

    fn submit_step(&mut self, wizard: &mut Wizard) -> Option<ScreenAction> {
        match wizard.step() {
            Step::Details => {
                if wizard.advance().is_ok() {
                    self.focus = 0;
                    self.sync_params(wizard);
                }
                None
            }
            Step::Parameters => {
                if wizard.can_advance() {
                    Some(ScreenAction::StartDeployment)
                } else {
                    None
                }
            }
            Step::Deployment | Step::Completed => None,
        }
    }

    // ── Rendering ────────────────────────────────────────────────────────

    pub fn render(&mut self, frame: &mut Frame, wizard: &Wizard) {
        let area = centered_rect(70, 80, frame.area());
        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(step_strip(wizard.step()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        match wizard.step() {
            Step::Details | Step::Parameters => self.render_form(frame, inner, wizard),
            Step::Deployment => render_deployment(frame, inner, wizard),
            Step::Completed => render_completed(frame, inner, wizard),
        }
    }

    fn render_form(&mut self, frame: &mut Frame, area: Rect, wizard: &Wizard) {
        let fields = self.fields_for(wizard);
        if fields.is_empty() {
            let hint = Paragraph::new("No constructor arguments required. Enter to deploy.")
                .style(Style::default().fg(Color::Gray));
            frame.render_widget(hint, area);
            return;
        }

        // label row + field rows + error row per field, footer hint at the
        // bottom
        let mut constraints = Vec::new();
        for id in &fields {
            constraints.push(Constraint::Length(1));
            constraints.push(Constraint::Length(self.field_height(*id)));
            constraints.push(Constraint::Length(1));
        }
        constraints.push(Constraint::Min(0));
        constraints.push(Constraint::Length(1));

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        for (i, id) in fields.iter().enumerate() {
            let focused = i == self.focus.min(fields.len() - 1);
            let label_style = if focused {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            frame.render_widget(
                Paragraph::new(field_label(*id)).style(label_style),
                rows[i * 3],
            );
            self.field_mut(*id).render(frame, rows[i * 3 + 1], focused);
            if let Some(error) = self.field_error(*id, wizard) {
                frame.render_widget(
                    Paragraph::new(error).style(Style::default().fg(Color::Red)),
                    rows[i * 3 + 2],
                );
            }
        }

        let footer = if wizard.can_advance() {
            match wizard.step() {
                Step::Details => "Tab: next field  Enter: continue  Esc: close",
                _ => "Tab: next field  Enter: deploy  Esc: close",
            }
        } else {
            "Tab: next field  Esc: close"
        };
        frame.render_widget(
            Paragraph::new(footer).style(Style::default().fg(Color::DarkGray)),
            rows[rows.len() - 1],
        );
    }

    fn field_height(&self, id: FieldId) -> u16 {
        match id {
            FieldId::Name | FieldId::Param(_) => 1,
            FieldId::Description => 3,
            FieldId::Owner => self.owner.render_height(),
            FieldId::InputType => self.input_type.render_height(),
            FieldId::ContractPick => self.contract_pick.render_height(),
            FieldId::Abi | FieldId::Code | FieldId::SolcOutput => 6,
        }
    }

    fn field_error(&self, id: FieldId, wizard: &Wizard) -> Option<String> {
        match id {
            FieldId::Name => wizard.name_error.clone(),
            FieldId::Description => wizard.description_error.clone(),
            FieldId::Owner => wizard.from_address_error.clone(),
            FieldId::Abi => wizard.abi_error.clone(),
            FieldId::Code => wizard.code_error.clone(),
            FieldId::SolcOutput => self.solc_error.clone(),
            FieldId::InputType | FieldId::ContractPick | FieldId::Param(_) => None,
        }
    }
}

fn field_label(id: FieldId) -> &'static str {
    match id {
        FieldId::Name => "Contract name",
        FieldId::Description => "Description",
        FieldId::Owner => "Owner account",
        FieldId::InputType => "Abi / bytecode source",
        FieldId::Abi => "Abi",
        FieldId::Code => "Bytecode",
        FieldId::SolcOutput => "Solc output",
        FieldId::ContractPick => "Contract",
        FieldId::Param(_) => "Constructor argument",
    }
}

/// Title strip naming every step, with the current one highlighted.
fn step_strip(current: Step) -> Line<'static> {
    let mut spans = vec![Span::raw(" ")];
    for (i, step) in Step::all().iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" → ", Style::default().fg(Color::DarkGray)));
        }
        let style = if *step == current {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(step.title(), style));
    }
    spans.push(Span::raw(" "));
    Line::from(spans)
}

fn render_deployment(frame: &mut Frame, area: Rect, wizard: &Wizard) {
    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(""));

    match wizard.outcome() {
        None => {
            lines.push(Line::from(Span::styled(
                "The deployment is currently in progress",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(wizard.progress_message().to_string()));
        }
        Some(Outcome::Rejected) => {
            lines.push(Line::from(Span::styled(
                "The deployment has been rejected",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(
                "You can safely close this window, the contract deployment will not occur.",
            ));
        }
        Some(Outcome::Failed(detail)) => {
            lines.push(Line::from(Span::styled(
                "The deployment has failed",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(detail.clone()));
        }
    }

    if let Some(txhash) = wizard.transaction_hash() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Transaction: ", Style::default().fg(Color::Gray)),
            Span::raw(txhash.as_str().to_string()),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        if wizard.outcome().is_some() {
            "Enter/Esc: close"
        } else {
            "Esc: close (deployment continues)"
        },
        Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn render_completed(frame: &mut Frame, area: Rect, wizard: &Wizard) {
    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "The contract deployment has been completed",
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Contract:    ", Style::default().fg(Color::Gray)),
        Span::raw(wizard.name.clone()),
    ]));
    if let Some(address) = wizard.deployed_address() {
        lines.push(Line::from(vec![
            Span::styled("Address:     ", Style::default().fg(Color::Gray)),
            Span::raw(address.as_str().to_string()),
        ]));
    }
    if let Some(txhash) = wizard.transaction_hash() {
        lines.push(Line::from(vec![
            Span::styled("Transaction: ", Style::default().fg(Color::Gray)),
            Span::raw(txhash.as_str().to_string()),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter/Esc: close",
        Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

/// Create a centered rect using up certain percentage of the available rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountInfo, Address};
    use crate::wizard::Prefill;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(screen: &mut WizardScreen, wizard: &mut Wizard, text: &str) {
        for c in text.chars() {
            screen.handle_key(press(KeyCode::Char(c)), wizard);
        }
    }

    fn test_wizard() -> Wizard {
        Wizard::new(
            vec![AccountInfo::new(Address::new(
                "0x63cf90d3f0410092fc0fca41846f596223979195",
            ))],
            Prefill::default(),
        )
    }

    const SIMPLE_ABI: &str =
        r#"[{"type":"constructor","inputs":[{"name":"supply","type":"uint256"}]}]"#;

    #[test]
    fn test_typing_into_name_runs_validation() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);

        type_text(&mut screen, &mut wizard, "ab");
        assert!(wizard.name_error.is_some());

        type_text(&mut screen, &mut wizard, "c");
        assert_eq!(wizard.name, "abc");
        assert!(wizard.name_error.is_none());
    }

    #[test]
    fn test_enter_only_advances_when_details_valid() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);

        screen.handle_key(press(KeyCode::Enter), &mut wizard);
        assert_eq!(wizard.step(), Step::Details);

        type_text(&mut screen, &mut wizard, "My Token");
        screen.handle_key(press(KeyCode::Enter), &mut wizard);
        assert_eq!(wizard.step(), Step::Parameters);
    }

    #[test]
    fn test_enter_in_textarea_inserts_newline_instead_of_submitting() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);
        type_text(&mut screen, &mut wizard, "My Token");
        assert!(wizard.details_valid());

        // Focus the description textarea; plain Enter must stay a newline.
        screen.handle_key(press(KeyCode::Tab), &mut wizard);
        screen.handle_key(press(KeyCode::Enter), &mut wizard);
        assert_eq!(wizard.step(), Step::Details);
        assert_eq!(wizard.description, "\n");
    }

    #[test]
    fn test_tab_cycles_focus() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);

        assert_eq!(screen.focus, 0);
        screen.handle_key(press(KeyCode::Tab), &mut wizard);
        assert_eq!(screen.focus, 1);
        screen.handle_key(press(KeyCode::Tab), &mut wizard);
        screen.handle_key(press(KeyCode::Tab), &mut wizard);
        assert_eq!(screen.focus, 0);
    }

    #[test]
    fn test_solc_paste_fills_abi_and_code() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);
        wizard.set_name("My Token");
        wizard.advance().unwrap();
        wizard.set_input_type(InputType::Solc);

        screen.solc_output.set_value(
            r#"{"contracts":{"Token.sol:Token":{"abi":[{"type":"constructor","inputs":[]}],"bin":"6060604052"}}}"#,
        );
        screen.reparse_solc(&mut wizard);

        assert!(screen.solc_error.is_none());
        assert_eq!(screen.solc_contracts.len(), 1);
        assert!(wizard.abi_error.is_none());
        assert!(wizard.code_error.is_none());
        assert!(wizard.parameters_valid());
    }

    #[test]
    fn test_bad_solc_paste_reports_error() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);

        screen.solc_output.set_value("not json");
        screen.reparse_solc(&mut wizard);
        assert!(screen.solc_error.is_some());
        assert!(screen.solc_contracts.is_empty());
    }

    #[test]
    fn test_abi_change_rebuilds_param_inputs() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);
        wizard.set_name("My Token");
        wizard.advance().unwrap();

        screen.abi.set_value(SIMPLE_ABI);
        screen.apply_field(FieldId::Abi, &mut wizard);
        assert_eq!(screen.params.len(), 1);

        screen.abi.set_value(r#"[{"type":"fallback"}]"#);
        screen.apply_field(FieldId::Abi, &mut wizard);
        assert!(screen.params.is_empty());
    }

    #[test]
    fn test_submit_from_parameters_requests_deployment() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);
        wizard.set_name("My Token");
        wizard.advance().unwrap();
        wizard.set_abi(SIMPLE_ABI);
        wizard.set_code("0x6060604052");
        screen.sync_params(&wizard);

        // Focus a param input so plain Enter submits.
        screen.focus = screen.fields_for(&wizard).len() - 1;
        let action = screen.handle_key(press(KeyCode::Enter), &mut wizard);
        assert_eq!(action, Some(ScreenAction::StartDeployment));
    }

    #[test]
    fn test_completed_view_closes_on_enter() {
        let mut wizard = test_wizard();
        let mut screen = WizardScreen::new(&wizard);
        wizard.set_name("My Token");
        wizard.set_abi(SIMPLE_ABI);
        wizard.set_code("0x6060604052");
        wizard.advance().unwrap();
        wizard.begin_deployment().unwrap();
        wizard.complete(Address::new("0x00000000000000000000000000000000000000aa"));

        let action = screen.handle_key(press(KeyCode::Enter), &mut wizard);
        assert_eq!(action, Some(ScreenAction::Close));
    }
}
