use super::entities::Match;

/// Keeps the best `max` matches, sorted by descending score, one per character.
/// Matches with equal scores stay in the order they were filed.
pub struct MatchCollector {
    max: usize,
    matches: Vec<Match>,
}

impl MatchCollector {
    pub fn new(max: usize) -> MatchCollector {
        MatchCollector {
            max,
            matches: Vec::with_capacity(max),
        }
    }

    fn remove_existing_lower(&mut self, mc: &Match) -> bool {
        let ix = match self.matches.iter().position(|x| x.hanzi == mc.hanzi) {
            Some(ix) => ix,
            // Not there yet: we're good, match doesn't need to be skipped
            None => return false,
        };
        // New score is not better: skip new match
        if mc.score <= self.matches[ix].score {
            return true;
        }
        // Remove existing match; don't skip new. Means shifting array left.
        self.matches.remove(ix);
        false
    }

    pub fn file_match(&mut self, mc: Match) {
        // Already at limit: don't bother if new match's score is not above current minimum
        if self.matches.len() >= self.max {
            match self.matches.last() {
                Some(last) if mc.score > last.score => {}
                _ => return,
            }
        }
        // If we get "true", we should skip new match (already there with higher score)
        if self.remove_existing_lower(&mc) {
            return;
        }
        // Largest score is always at start of vector; new match goes after any equal scores
        let ix = self.matches.iter().position(|x| x.score < mc.score);
        match ix {
            Some(ix) => self.matches.insert(ix, mc),
            None => self.matches.push(mc),
        }
        // Beyond limit? Drop last item.
        if self.matches.len() > self.max {
            self.matches.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn into_matches(self) -> Vec<Match> {
        self.matches
    }
}
