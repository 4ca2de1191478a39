use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

use crate::*;

/// Valid transitions:
/// - Preview -> Playing (preview window elapsed)
/// - Playing -> GameOver (last pair found)
/// - any -> Preview (new round)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Preview,
    Playing,
    GameOver,
}

impl Phase {
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }

    pub const fn is_final(self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Preview
    }
}

/// Why a click was dropped. Dropped clicks are expected races between input and animations, not errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    NotPlaying,
    UnknownCard,
    NotInteractable,
    Processing,
    AlreadyRevealed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    Ignored(IgnoreReason),
    /// First card of a pair turned face up
    Selected,
    /// Second card turned face up, the pair is waiting for evaluation
    Paired,
}

impl ClickOutcome {
    pub const fn has_update(self) -> bool {
        !matches!(self, Self::Ignored(_))
    }
}

/// Deferred work on the engine's timer queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Task {
    EndPreview,
    Evaluate { first: CardId, second: CardId },
    HideMismatched { first: CardId, second: CardId },
    AnimationDone { card: CardId, animation: Animation },
}

/// Point-in-time copy of the engine state, for displays and diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub phase: Phase,
    pub total_pairs: Count,
    pub matches_found: Count,
    pub score: ScoreSnapshot,
    pub selection: Vec<CardId>,
    pub processing: Vec<CardId>,
    pub cards: Vec<(CardId, CardState)>,
    pub now: Millis,
}

/// Game state machine and selection arbiter.
///
/// Owns the round counters, the dealt cards, the selection of at most two face-up cards and the set of cards locked
/// inside a pending evaluation. A card is never in both at once: pairing drains the selection into the processing
/// set in one step, and a card leaves the processing set only when its evaluation resolves.
pub struct MatchEngine<S> {
    config: GameConfig,
    phase: Phase,
    round: u32,
    layout: Option<GridLayout>,
    total_pairs: Count,
    matches_found: Count,
    deals: u32,
    deck: Option<Deck>,
    cards: BTreeMap<CardId, Card>,
    next_card: u32,
    selection: SmallVec<[CardId; 2]>,
    processing: BTreeSet<CardId>,
    scheduler: Scheduler<Task>,
    score: ScoreTracker,
    progress: ProgressStore<S>,
    presenter: Box<dyn Presenter>,
    audio: Box<dyn AudioSink>,
}

impl<S: KeyValueStore> MatchEngine<S> {
    pub fn new(
        config: GameConfig,
        score: ScoreTracker,
        progress: ProgressStore<S>,
        presenter: impl Presenter + 'static,
        audio: impl AudioSink + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            phase: Phase::default(),
            round: 0,
            layout: None,
            total_pairs: 0,
            matches_found: 0,
            deals: 0,
            deck: None,
            cards: BTreeMap::new(),
            next_card: 0,
            selection: SmallVec::new(),
            processing: BTreeSet::new(),
            scheduler: Scheduler::new(),
            score,
            progress,
            presenter: Box::new(presenter),
            audio: Box::new(audio),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn total_pairs(&self) -> Count {
        self.total_pairs
    }

    pub fn matches_found(&self) -> Count {
        self.matches_found
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(&id)
    }

    pub fn cards(&self) -> impl Iterator<Item = (CardId, &Card)> + '_ {
        self.cards.iter().map(|(&id, card)| (id, card))
    }

    pub fn selection(&self) -> &[CardId] {
        &self.selection
    }

    pub fn is_processing(&self, id: CardId) -> bool {
        self.processing.contains(&id)
    }

    pub fn processing(&self) -> impl Iterator<Item = CardId> + '_ {
        self.processing.iter().copied()
    }

    pub fn score(&self) -> &ScoreTracker {
        &self.score
    }

    /// Mutable access for subscribing displays; the counters themselves only change through the engine.
    pub fn score_mut(&mut self) -> &mut ScoreTracker {
        &mut self.score
    }

    pub fn progress(&self) -> &ProgressStore<S> {
        &self.progress
    }

    pub fn now(&self) -> Millis {
        self.scheduler.now()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_empty()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            phase: self.phase,
            total_pairs: self.total_pairs,
            matches_found: self.matches_found,
            score: self.score.snapshot(),
            selection: self.selection.to_vec(),
            processing: self.processing.iter().copied().collect(),
            cards: self.cards().map(|(id, card)| (id, card.state())).collect(),
            now: self.now(),
        }
    }

    /// Generates and keeps the shuffled deck for `pair_count` pairs.
    pub fn randomized_shape_pairs(&mut self, pair_count: Count) -> Result<&Deck> {
        self.deals += 1;
        let seed = self.config.round_seed(self.deals);
        let deck = RandomDeckGenerator::new(seed).generate(pair_count, self.config.shape_count)?;
        Ok(&*self.deck.insert(deck))
    }

    /// Shape for the card dealt at `index` from the last generated deck.
    pub fn shape_id_for_card(&self, index: usize) -> Option<ShapeId> {
        self.deck.as_ref()?.shape_at(index)
    }

    /// Starts a new round of `pair_count` pairs in the preview phase.
    ///
    /// Cards left over from the previous round are destroyed and every task it scheduled is dropped.
    pub fn set_total_pairs(&mut self, pair_count: Count) -> Result<()> {
        if pair_count == 0 {
            return Err(GameError::NoPairs);
        }

        for id in core::mem::take(&mut self.cards).into_keys() {
            self.presenter.destroy(id);
        }
        self.scheduler.clear();
        self.selection.clear();
        self.processing.clear();

        self.round += 1;
        self.total_pairs = pair_count;
        self.matches_found = 0;
        self.phase = Phase::Preview;
        self.score.reset_score();
        self.scheduler.schedule(self.config.preview_ms, Task::EndPreview);
        log::debug!("Round {} started with {} pairs", self.round, pair_count);
        Ok(())
    }

    /// Deals one card face up for the preview; it turns face down on its own.
    pub fn spawn_card(&mut self, shape: Option<ShapeId>) -> CardId {
        let id = CardId::new(self.next_card);
        self.next_card += 1;

        let mut card = Card::new(shape);
        card.begin_preview();
        self.cards.insert(id, card);
        self.animate(id, Animation::Preview);
        log::trace!("Spawned card {} with shape {:?}", id, shape);
        id
    }

    /// Takes a card off the table from outside, e.g. on scene teardown. Pending evaluations tolerate it.
    pub fn destroy_card(&mut self, id: CardId) -> bool {
        if self.cards.remove(&id).is_none() {
            return false;
        }
        self.selection.retain(|&mut selected| selected != id);
        self.presenter.destroy(id);
        log::debug!("Card {} destroyed", id);
        true
    }

    /// Validates `layout`, shuffles a deck for it and deals every card.
    pub fn start_round(&mut self, layout: GridLayout) -> Result<Vec<CardId>> {
        self.layout = Some(layout);
        self.randomized_shape_pairs(layout.pair_count())?;
        self.set_total_pairs(layout.pair_count())?;
        Ok(self.deal_deck())
    }

    /// Resumes the saved game when allowed and present, otherwise starts a fresh round.
    ///
    /// Only the three counters are saved, so resuming deals the pairs that were still missing.
    pub fn resume_or_start(&mut self, layout: GridLayout) -> Result<Vec<CardId>> {
        if !self.config.load_save_on_start || !self.progress.has_save() {
            return self.start_round(layout);
        }
        let saved = match self.progress.load_progress() {
            Ok(saved) => saved,
            Err(err) => {
                log::error!("Could not load saved game, starting fresh: {}", err);
                return self.start_round(layout);
            }
        };

        let total_pairs = layout.pair_count();
        let matches = saved.matches_found.min(total_pairs);
        if matches < saved.matches_found {
            log::warn!(
                "Saved game found {} matches but the grid only holds {} pairs",
                saved.matches_found,
                total_pairs
            );
        }

        self.layout = Some(layout);
        self.set_total_pairs(total_pairs)?;
        self.matches_found = matches;
        self.score.restore_matches(matches);
        self.score.restore_state(saved.score, saved.total_attempts);
        log::info!(
            "Resumed saved game, score: {}, matches: {}/{}, attempts: {}",
            saved.score,
            matches,
            total_pairs,
            saved.total_attempts
        );

        if matches == total_pairs {
            self.scheduler.clear();
            self.deck = None;
            self.phase = Phase::GameOver;
            return Ok(Vec::new());
        }
        self.randomized_shape_pairs(total_pairs - matches)?;
        Ok(self.deal_deck())
    }

    /// Forgets the save and deals a fresh round of the same size.
    pub fn restart_game(&mut self) -> Result<Vec<CardId>> {
        if let Err(err) = self.progress.clear_save() {
            log::error!("Could not clear saved game: {}", err);
        }
        match self.layout {
            Some(layout) => self.start_round(layout),
            None => {
                self.set_total_pairs(self.total_pairs)?;
                Ok(Vec::new())
            }
        }
    }

    /// Click entry point for a card: drops clicks on cards that are gone, mid-animation or not yet in play.
    pub fn card_clicked(&mut self, id: CardId) -> ClickOutcome {
        let Some(card) = self.cards.get(&id) else {
            log::trace!("Click on unknown card {}", id);
            return ClickOutcome::Ignored(IgnoreReason::UnknownCard);
        };
        if !self.phase.is_playing() {
            return ClickOutcome::Ignored(IgnoreReason::NotPlaying);
        }
        if !card.accepts_click() {
            log::trace!("Card {} is not accepting clicks", id);
            return ClickOutcome::Ignored(IgnoreReason::NotInteractable);
        }
        self.on_card_clicked(id)
    }

    /// Selection arbiter: turns the card face up and pairs it with the previous pick.
    pub fn on_card_clicked(&mut self, id: CardId) -> ClickOutcome {
        use IgnoreReason::*;

        if !self.phase.is_playing() {
            return ClickOutcome::Ignored(NotPlaying);
        }
        if self.processing.contains(&id) {
            return ClickOutcome::Ignored(Processing);
        }
        let Some(card) = self.cards.get_mut(&id) else {
            return ClickOutcome::Ignored(UnknownCard);
        };
        if card.is_revealed() {
            return ClickOutcome::Ignored(AlreadyRevealed);
        }
        if !card.reveal().has_update() {
            return ClickOutcome::Ignored(NotInteractable);
        }

        self.audio.play(GameEvent::CardFlip);
        self.animate(id, Animation::FlipToFront);
        self.selection.push(id);
        log::debug!("Card {} selected", id);

        if self.selection.len() < 2 {
            return ClickOutcome::Selected;
        }

        let first = self.selection[0];
        let second = self.selection[1];
        self.selection.clear();
        self.processing.insert(first);
        self.processing.insert(second);
        self.scheduler
            .schedule(self.config.match_delay_ms, Task::Evaluate { first, second });
        log::debug!("Cards {} and {} paired", first, second);
        ClickOutcome::Paired
    }

    /// Moves the clock forward by `elapsed`, running every task that falls due on the way.
    pub fn advance(&mut self, elapsed: Millis) {
        let deadline = self.scheduler.now().saturating_add(elapsed);
        while let Some(task) = self.scheduler.pop_due(deadline) {
            self.dispatch(task);
        }
        self.scheduler.advance_to(deadline);
    }

    /// Runs tasks until the queue is empty, jumping the clock as needed.
    pub fn run_until_idle(&mut self) {
        while let Some(task) = self.scheduler.pop_next() {
            self.dispatch(task);
        }
    }

    /// Persists the three counters, except during the preview. Returns whether a save happened.
    pub fn save_game(&mut self) -> bool {
        if self.phase == Phase::Preview {
            return false;
        }
        let score = self.score.snapshot();
        match self.progress.save_progress(
            score.current_score,
            self.matches_found,
            score.total_attempts,
        ) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Could not save progress: {}", err);
                false
            }
        }
    }

    /// Host is going to the background.
    pub fn suspend(&mut self) -> bool {
        self.save_game()
    }

    /// Host is quitting.
    pub fn shutdown(&mut self) -> bool {
        self.save_game()
    }

    fn deal_deck(&mut self) -> Vec<CardId> {
        let count = self.deck.as_ref().map_or(0, Deck::len);
        (0..count)
            .map(|index| {
                let shape = self.shape_id_for_card(index);
                self.spawn_card(shape)
            })
            .collect()
    }

    fn animate(&mut self, card: CardId, animation: Animation) {
        let duration = self.presenter.play(card, animation);
        self.scheduler
            .schedule(duration, Task::AnimationDone { card, animation });
    }

    fn dispatch(&mut self, task: Task) {
        log::trace!("t={} running {:?}", self.scheduler.now(), task);
        match task {
            Task::EndPreview => {
                if self.phase == Phase::Preview {
                    self.phase = Phase::Playing;
                    log::debug!("Preview over, round {} is playing", self.round);
                }
            }
            Task::Evaluate { first, second } => self.evaluate_match(first, second),
            Task::HideMismatched { first, second } => {
                self.hide_card(first);
                self.hide_card(second);
            }
            Task::AnimationDone { card, animation } => self.finish_animation(card, animation),
        }
    }

    fn finish_animation(&mut self, id: CardId, animation: Animation) {
        let Some(card) = self.cards.get_mut(&id) else {
            return;
        };
        match animation {
            Animation::Match => {
                card.finish_transition();
                card.remove();
                card.set_busy();
                self.animate(id, Animation::Destroy);
            }
            Animation::Destroy => {
                self.cards.remove(&id);
                self.presenter.destroy(id);
                log::trace!("Card {} removed from the table", id);
            }
            Animation::Preview | Animation::FlipToFront | Animation::FlipToBack => {
                if card.finish_transition() {
                    self.hide_card(id);
                }
            }
        }
    }

    fn hide_card(&mut self, id: CardId) {
        let Some(card) = self.cards.get_mut(&id) else {
            return;
        };
        if card.hide_or_defer().has_update() {
            self.audio.play(GameEvent::CardFlip);
            self.animate(id, Animation::FlipToBack);
        }
    }

    fn evaluate_match(&mut self, first: CardId, second: CardId) {
        let shapes = (
            self.cards.get(&first).map(Card::shape_id),
            self.cards.get(&second).map(Card::shape_id),
        );
        let is_match = match shapes {
            (Some(Some(a)), Some(Some(b))) => a == b,
            (Some(_), Some(_)) => false,
            _ => {
                log::warn!(
                    "Card {} or {} vanished before evaluation, counting a mismatch",
                    first,
                    second
                );
                false
            }
        };

        self.score.process_match_attempt(is_match);

        if is_match {
            self.matches_found += 1;
            for id in [first, second] {
                if let Some(card) = self.cards.get_mut(&id) {
                    card.mark_matched();
                    card.set_busy();
                    self.audio.play(GameEvent::CardMatch);
                    self.animate(id, Animation::Match);
                }
            }
            log::debug!(
                "Pair {} and {} matched, {}/{}",
                first,
                second,
                self.matches_found,
                self.total_pairs
            );

            if self.matches_found == self.total_pairs {
                self.phase = Phase::GameOver;
                self.audio.play(GameEvent::GameOver);
                log::info!(
                    "Game over after {} attempts, score {}",
                    self.score.total_attempts(),
                    self.score.current_score()
                );
            }
        } else {
            self.audio.play(GameEvent::CardMismatch);
            self.scheduler.schedule(
                self.config.match_delay_ms,
                Task::HideMismatched { first, second },
            );
        }

        self.processing.remove(&first);
        self.processing.remove(&second);
        self.save_game();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder {
        animations: Rc<RefCell<Vec<(CardId, Animation)>>>,
        sounds: Rc<RefCell<Vec<GameEvent>>>,
        destroyed: Rc<RefCell<Vec<CardId>>>,
    }

    impl Recorder {
        fn sound_count(&self, event: GameEvent) -> usize {
            self.sounds.borrow().iter().filter(|&&e| e == event).count()
        }
    }

    struct RecordingPresenter {
        recorder: Recorder,
        timings: AnimationTimings,
    }

    impl Presenter for RecordingPresenter {
        fn play(&mut self, card: CardId, animation: Animation) -> Millis {
            self.recorder.animations.borrow_mut().push((card, animation));
            self.timings.duration(animation)
        }

        fn destroy(&mut self, card: CardId) {
            self.recorder.destroyed.borrow_mut().push(card);
        }
    }

    type Engine = MatchEngine<MemoryStore>;

    fn config() -> GameConfig {
        GameConfig {
            shape_count: 8,
            preview_ms: 2000,
            match_delay_ms: 500,
            match_reward: 100,
            mismatch_penalty: -10,
            load_save_on_start: true,
            seed: 99,
        }
    }

    fn engine_with(config: GameConfig, store: MemoryStore) -> (Engine, Recorder) {
        let recorder = Recorder::default();
        let presenter = RecordingPresenter {
            recorder: recorder.clone(),
            timings: AnimationTimings::default(),
        };
        let sounds = recorder.sounds.clone();
        let engine = MatchEngine::new(
            config.clone(),
            ScoreTracker::from_config(&config),
            ProgressStore::new(store),
            presenter,
            move |event: GameEvent| sounds.borrow_mut().push(event),
        )
        .unwrap();
        (engine, recorder)
    }

    fn engine() -> (Engine, Recorder) {
        engine_with(config(), MemoryStore::new())
    }

    /// Deals `rows x columns` and waits out the preview
    fn playing(engine: &mut Engine, rows: Count, columns: Count) -> Vec<CardId> {
        let ids = engine.start_round(GridLayout::new(rows, columns).unwrap()).unwrap();
        engine.advance(2000);
        assert_eq!(engine.phase(), Phase::Playing);
        ids
    }

    fn shape(engine: &Engine, id: CardId) -> ShapeId {
        engine.card(id).unwrap().shape_id().unwrap()
    }

    fn matching_pair(engine: &Engine, ids: &[CardId]) -> (CardId, CardId) {
        let first = ids[0];
        let second = ids[1..]
            .iter()
            .copied()
            .find(|&id| shape(engine, id) == shape(engine, first))
            .unwrap();
        (first, second)
    }

    fn mismatched_pair(engine: &Engine, ids: &[CardId]) -> (CardId, CardId) {
        let first = ids[0];
        let second = ids[1..]
            .iter()
            .copied()
            .find(|&id| shape(engine, id) != shape(engine, first))
            .unwrap();
        (first, second)
    }

    fn assert_invariants(engine: &Engine) {
        assert!(engine.matches_found() <= engine.total_pairs());
        if engine.total_pairs() > 0 {
            assert_eq!(
                engine.matches_found() == engine.total_pairs(),
                engine.phase() == Phase::GameOver
            );
        }
        assert!(engine.selection().len() <= 2);
        for id in engine.selection() {
            assert!(!engine.is_processing(*id));
        }
    }

    #[test]
    fn set_total_pairs_deals_each_shape_twice() {
        let (mut engine, _) = engine();

        let deck = engine.randomized_shape_pairs(3).unwrap().clone();
        engine.set_total_pairs(3).unwrap();

        assert_eq!(deck.len(), 6);
        for shape in 0..3 {
            assert_eq!(deck.shapes().iter().filter(|&&s| s == shape).count(), 2);
        }
        assert_eq!(engine.shape_id_for_card(5), deck.shape_at(5));
        assert_eq!(engine.shape_id_for_card(6), None);
        assert_eq!(engine.total_pairs(), 3);
        assert_eq!(engine.phase(), Phase::Preview);
    }

    #[test]
    fn zero_pairs_cannot_start() {
        let (mut engine, _) = engine();
        assert_eq!(engine.set_total_pairs(0), Err(GameError::NoPairs));
        assert_eq!(engine.randomized_shape_pairs(0).err(), Some(GameError::NoPairs));
    }

    #[test]
    fn clicks_during_preview_are_dropped() {
        let (mut engine, _) = engine();
        let ids = engine.start_round(GridLayout::new(2, 2).unwrap()).unwrap();

        assert_eq!(
            engine.card_clicked(ids[0]),
            ClickOutcome::Ignored(IgnoreReason::NotPlaying)
        );
        engine.advance(1999);
        assert_eq!(engine.phase(), Phase::Preview);
        engine.advance(1);
        assert_eq!(engine.phase(), Phase::Playing);
        assert!(ids.iter().all(|&id| engine.card(id).unwrap().accepts_click()));
        assert_eq!(engine.card_clicked(ids[0]), ClickOutcome::Selected);
    }

    #[test]
    fn matching_pair_is_scored_then_removed() {
        let (mut engine, recorder) = engine();
        let ids = playing(&mut engine, 2, 3);
        let (a, b) = matching_pair(&engine, &ids);

        assert_eq!(engine.card_clicked(a), ClickOutcome::Selected);
        assert_eq!(engine.card_clicked(b), ClickOutcome::Paired);
        assert!(engine.selection().is_empty());
        assert!(engine.is_processing(a) && engine.is_processing(b));

        engine.advance(500);
        assert_eq!(engine.matches_found(), 1);
        assert_eq!(engine.score().current_score(), 100);
        assert_eq!(engine.score().total_attempts(), 1);
        assert_eq!(engine.card(a).unwrap().state(), CardState::Matched);
        assert_eq!(engine.card(b).unwrap().state(), CardState::Matched);
        assert!(!engine.is_processing(a) && !engine.is_processing(b));
        assert_eq!(recorder.sound_count(GameEvent::CardMatch), 2);

        engine.advance(400);
        assert_eq!(engine.card(a).unwrap().state(), CardState::Removed);

        engine.advance(300);
        assert!(engine.card(a).is_none());
        assert!(engine.card(b).is_none());
        assert!(recorder.destroyed.borrow().contains(&a));
        assert_eq!(engine.phase(), Phase::Playing);
        assert_invariants(&engine);
    }

    #[test]
    fn mismatched_pair_is_penalized_and_hidden_again() {
        let (mut engine, recorder) = engine();
        let ids = playing(&mut engine, 2, 3);
        let (a, c) = mismatched_pair(&engine, &ids);

        engine.card_clicked(a);
        engine.card_clicked(c);
        engine.advance(500);

        assert_eq!(engine.score().current_score(), -10);
        assert_eq!(engine.matches_found(), 0);
        assert_eq!(recorder.sound_count(GameEvent::CardMismatch), 1);
        assert!(engine.card(a).unwrap().is_revealed());
        assert!(!engine.is_processing(a));
        assert_eq!(
            engine.card_clicked(a),
            ClickOutcome::Ignored(IgnoreReason::AlreadyRevealed)
        );

        engine.advance(500);
        assert_eq!(engine.card(a).unwrap().state(), CardState::Hidden);
        assert_eq!(engine.card(c).unwrap().state(), CardState::Hidden);

        engine.advance(300);
        assert!(engine.card(a).unwrap().accepts_click());
        assert!(engine.card(c).unwrap().accepts_click());
        assert_invariants(&engine);
    }

    #[test]
    fn click_on_card_mid_reveal_is_noop() {
        let (mut engine, _) = engine();
        let ids = playing(&mut engine, 2, 2);

        engine.card_clicked(ids[0]);
        assert_eq!(
            engine.card_clicked(ids[0]),
            ClickOutcome::Ignored(IgnoreReason::NotInteractable)
        );
        assert_eq!(
            engine.on_card_clicked(ids[0]),
            ClickOutcome::Ignored(IgnoreReason::AlreadyRevealed)
        );
        assert_eq!(engine.selection(), &[ids[0]]);
    }

    #[test]
    fn cards_under_evaluation_reject_clicks() {
        let (mut engine, _) = engine();
        let ids = playing(&mut engine, 2, 2);
        let (a, b) = mismatched_pair(&engine, &ids);

        engine.card_clicked(a);
        engine.card_clicked(b);
        engine.advance(300);

        assert_eq!(
            engine.card_clicked(a),
            ClickOutcome::Ignored(IgnoreReason::Processing)
        );
        assert!(engine.selection().is_empty());
    }

    #[test]
    fn overlapping_evaluations_resolve_independently() {
        let (mut engine, _) = engine();
        let ids = playing(&mut engine, 2, 4);
        let (a, b) = matching_pair(&engine, &ids);
        let rest: Vec<_> = ids.iter().copied().filter(|&id| id != a && id != b).collect();
        let (c, d) = matching_pair(&engine, &rest);

        engine.card_clicked(a);
        engine.card_clicked(b);
        engine.advance(100);
        engine.card_clicked(c);
        assert_eq!(engine.card_clicked(d), ClickOutcome::Paired);
        assert_eq!(engine.processing().count(), 4);
        assert_invariants(&engine);

        engine.advance(400);
        assert_eq!(engine.matches_found(), 1);
        assert_eq!(engine.processing().count(), 2);

        engine.advance(100);
        assert_eq!(engine.matches_found(), 2);
        assert_eq!(engine.processing().count(), 0);
        assert_invariants(&engine);
    }

    #[test]
    fn single_pair_game_ends_with_one_save_and_one_notification() {
        let (mut engine, recorder) = engine();
        let ids = playing(&mut engine, 1, 2);

        engine.card_clicked(ids[0]);
        engine.card_clicked(ids[1]);
        engine.advance(500);

        assert_eq!(engine.phase(), Phase::GameOver);
        assert_eq!(engine.progress().store().commit_count(), 1);
        assert_eq!(recorder.sound_count(GameEvent::GameOver), 1);
        assert_eq!(
            engine.progress().load_progress().unwrap(),
            SavedProgress {
                score: 100,
                matches_found: 1,
                total_attempts: 1,
                best_score: 100,
            }
        );

        engine.run_until_idle();
        assert_eq!(engine.cards().count(), 0);
        assert_eq!(
            engine.card_clicked(ids[0]),
            ClickOutcome::Ignored(IgnoreReason::UnknownCard)
        );
        assert_invariants(&engine);
    }

    #[test]
    fn every_resolved_attempt_is_saved() {
        let (mut engine, _) = engine();
        let ids = playing(&mut engine, 2, 3);
        let (a, c) = mismatched_pair(&engine, &ids);

        engine.card_clicked(a);
        engine.card_clicked(c);
        engine.advance(500);

        assert_eq!(engine.progress().store().commit_count(), 1);
        let saved = engine.progress().load_progress().unwrap();
        assert_eq!((saved.score, saved.matches_found, saved.total_attempts), (-10, 0, 1));
    }

    #[test]
    fn card_destroyed_mid_evaluation_counts_as_mismatch() {
        let (mut engine, recorder) = engine();
        let ids = playing(&mut engine, 2, 2);
        let (a, b) = matching_pair(&engine, &ids);

        engine.card_clicked(a);
        engine.card_clicked(b);
        assert!(engine.destroy_card(b));
        assert!(!engine.destroy_card(b));
        engine.advance(500);

        assert_eq!(engine.matches_found(), 0);
        assert_eq!(engine.score().total_attempts(), 1);
        assert_eq!(engine.score().current_score(), -10);
        assert_eq!(engine.processing().count(), 0);
        assert_eq!(recorder.sound_count(GameEvent::CardMismatch), 1);

        engine.run_until_idle();
        assert_eq!(engine.card(a).unwrap().state(), CardState::Hidden);
        assert!(engine.card(a).unwrap().accepts_click());
    }

    #[test]
    fn destroying_a_selected_card_drops_it_from_the_selection() {
        let (mut engine, _) = engine();
        let ids = playing(&mut engine, 2, 2);

        engine.card_clicked(ids[0]);
        engine.destroy_card(ids[0]);

        assert!(engine.selection().is_empty());
    }

    #[test]
    fn restart_drops_pending_evaluations() {
        let (mut engine, recorder) = engine();
        let ids = playing(&mut engine, 2, 2);
        let (a, b) = matching_pair(&engine, &ids);
        engine.card_clicked(a);
        engine.card_clicked(b);

        let fresh = engine.restart_game().unwrap();

        assert_eq!(engine.phase(), Phase::Preview);
        assert_eq!(engine.round(), 2);
        assert!(engine.selection().is_empty());
        assert_eq!(engine.processing().count(), 0);
        assert!(engine.card(a).is_none());
        assert_eq!(fresh.len(), 4);
        assert!(fresh.iter().all(|id| !ids.contains(id)));
        assert_eq!(recorder.destroyed.borrow().len(), 4);

        engine.run_until_idle();
        assert_eq!(engine.score().snapshot(), ScoreSnapshot::default());
        assert_eq!(engine.matches_found(), 0);
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn restart_clears_the_save_but_keeps_best_score() {
        let (mut engine, _) = engine();
        let ids = playing(&mut engine, 1, 2);
        engine.card_clicked(ids[0]);
        engine.card_clicked(ids[1]);
        engine.run_until_idle();
        assert!(engine.progress().has_save());

        engine.restart_game().unwrap();

        assert!(!engine.progress().has_save());
        assert_eq!(engine.progress().best_score().unwrap(), 100);
    }

    #[test]
    fn resume_deals_only_missing_pairs() {
        let mut progress = ProgressStore::new(MemoryStore::new());
        progress.save_progress(180, 2, 5).unwrap();
        let (mut engine, _) = engine_with(config(), progress.into_inner());

        let ids = engine.resume_or_start(GridLayout::new(2, 3).unwrap()).unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(engine.total_pairs(), 3);
        assert_eq!(engine.matches_found(), 2);
        assert_eq!(engine.score().current_score(), 180);
        assert_eq!(engine.score().total_attempts(), 5);
        assert_eq!(engine.score().matches_found(), 2);

        engine.advance(2000);
        engine.card_clicked(ids[0]);
        engine.card_clicked(ids[1]);
        engine.advance(500);

        assert_eq!(engine.phase(), Phase::GameOver);
        assert_eq!(engine.score().current_score(), 280);
        assert_invariants(&engine);
    }

    #[test]
    fn resume_of_finished_game_is_game_over() {
        let mut progress = ProgressStore::new(MemoryStore::new());
        progress.save_progress(300, 5, 9).unwrap();
        let (mut engine, _) = engine_with(config(), progress.into_inner());

        let ids = engine.resume_or_start(GridLayout::new(2, 2).unwrap()).unwrap();

        assert!(ids.is_empty());
        assert_eq!(engine.phase(), Phase::GameOver);
        assert_eq!(engine.matches_found(), 2);
        assert!(engine.is_idle());
        assert_invariants(&engine);
    }

    #[test]
    fn resume_disabled_starts_fresh() {
        let mut progress = ProgressStore::new(MemoryStore::new());
        progress.save_progress(300, 1, 9).unwrap();
        let config = GameConfig {
            load_save_on_start: false,
            ..config()
        };
        let (mut engine, _) = engine_with(config, progress.into_inner());

        let ids = engine.resume_or_start(GridLayout::new(2, 2).unwrap()).unwrap();

        assert_eq!(ids.len(), 4);
        assert_eq!(engine.matches_found(), 0);
        assert_eq!(engine.score().current_score(), 0);
    }

    #[test]
    fn no_save_during_preview() {
        let (mut engine, _) = engine();
        engine.start_round(GridLayout::new(2, 2).unwrap()).unwrap();

        assert!(!engine.suspend());
        assert!(!engine.progress().has_save());

        engine.advance(2000);
        assert!(engine.shutdown());
        assert_eq!(
            engine.progress().load_progress().unwrap(),
            SavedProgress::default()
        );
        assert!(engine.progress().has_save());
    }

    #[test]
    fn hide_waits_for_a_running_flip() {
        let config = GameConfig {
            match_delay_ms: 100,
            ..config()
        };
        let (mut engine, _) = engine_with(config, MemoryStore::new());
        let ids = playing(&mut engine, 2, 2);
        let (a, c) = mismatched_pair(&engine, &ids);

        engine.card_clicked(a);
        engine.card_clicked(c);
        // evaluation at +100, hide request at +200, flips finish at +300
        engine.advance(250);
        assert!(engine.card(a).unwrap().is_revealed());

        engine.advance(50);
        assert_eq!(engine.card(a).unwrap().state(), CardState::Hidden);
        engine.run_until_idle();
        assert!(engine.card(a).unwrap().accepts_click());
        assert!(engine.card(c).unwrap().accepts_click());
    }

    #[test]
    fn unassigned_shapes_never_match() {
        let (mut engine, _) = engine();
        engine.set_total_pairs(1).unwrap();
        let a = engine.spawn_card(None);
        let b = engine.spawn_card(None);
        engine.advance(2000);

        engine.card_clicked(a);
        engine.card_clicked(b);
        engine.advance(500);

        assert_eq!(engine.matches_found(), 0);
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn score_subscribers_see_every_attempt() {
        let (mut engine, _) = engine();
        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = updates.clone();
        engine
            .score_mut()
            .subscribe(move |snapshot: ScoreSnapshot| sink.borrow_mut().push(snapshot));

        let ids = playing(&mut engine, 1, 2);
        engine.card_clicked(ids[0]);
        engine.card_clicked(ids[1]);
        engine.advance(500);

        let updates = updates.borrow();
        // reset on round start, then the attempt
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].total_attempts, 1);
        assert_eq!(updates[1].matches_found, 1);
    }

    #[test]
    fn perfect_memory_game_reaches_game_over() {
        let (mut engine, recorder) = engine();
        let ids = playing(&mut engine, 4, 4);

        let mut remaining = ids.clone();
        while !remaining.is_empty() {
            let (a, b) = matching_pair(&engine, &remaining);
            engine.card_clicked(a);
            engine.card_clicked(b);
            engine.advance(500);
            assert_invariants(&engine);
            remaining.retain(|&id| id != a && id != b);
        }
        engine.run_until_idle();

        assert_eq!(engine.phase(), Phase::GameOver);
        assert_eq!(engine.matches_found(), 8);
        assert_eq!(engine.score().current_score(), 800);
        assert_eq!(engine.cards().count(), 0);
        assert_eq!(recorder.sound_count(GameEvent::GameOver), 1);
        assert_eq!(engine.progress().store().commit_count(), 8);
    }

    #[test]
    fn snapshot_reflects_selection() {
        let (mut engine, _) = engine();
        let ids = playing(&mut engine, 2, 2);
        engine.card_clicked(ids[0]);

        let snapshot = engine.snapshot();

        assert_eq!(snapshot.phase, Phase::Playing);
        assert_eq!(snapshot.selection, vec![ids[0]]);
        assert!(snapshot.processing.is_empty());
        assert_eq!(snapshot.cards.len(), 4);
        assert_eq!(snapshot.now, 2000);
    }
}
