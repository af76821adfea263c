use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use rayon::ThreadPool;

use super::end_detect::EndDetector;
use super::state::{sort_by_score_desc, CtcExtra, EndedHyp, Hypothesis, LmExtra};
use super::SpecialTokens;
use crate::config::DecodeConfig;
use crate::ctc::CtcPrefixScorer;
use crate::error::{DecodeError, Result};
use crate::model::{AttentionDecoder, LanguageModel, TokenId};
use crate::vocab::TokenList;

pub(crate) struct SearchContext<'a, D: AttentionDecoder, L> {
    pub decoder: &'a D,
    pub memory: &'a D::Memory,
    pub ctc: Option<&'a CtcPrefixScorer>,
    pub lm: Option<&'a L>,
    pub config: &'a DecodeConfig,
    pub tokens: SpecialTokens,
    pub end_detector: &'a dyn EndDetector,
    pub token_list: Option<&'a TokenList>,
    /// Workers for CTC scoring; `None` expands hypotheses inline.
    pub pool: Option<&'a ThreadPool>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchLimits {
    pub maxlen: usize,
    pub minlen: usize,
}

#[derive(Debug, Clone, Copy)]
struct Weights {
    ctc: f64,
    lm: f64,
    beam: usize,
    ctc_beam: usize,
}

/// Everything needed to expand one hypothesis; shared read-only with workers.
struct Expansion<'a> {
    tokens: &'a [TokenId],
    ctc: Option<&'a CtcExtra>,
    att: ArrayView1<'a, f32>,
    lm: Option<ArrayView1<'a, f32>>,
}

struct Candidate {
    token: TokenId,
    delta: f64,
    ctc: Option<CtcExtra>,
}

/// Scales a log-probability, treating a zero weight as "source disabled".
fn weighted(weight: f64, value: f32) -> f64 {
    if weight == 0.0 {
        0.0
    } else {
        weight * f64::from(value)
    }
}

/// Ids of the `k` best finite scores, best first.
fn top_k(scores: &[f64], k: usize) -> Vec<TokenId> {
    let mut ids: Vec<TokenId> = (0..scores.len())
        .filter(|&i| scores[i].is_finite())
        .collect();
    ids.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    ids.truncate(k);
    ids
}

fn expand(job: &Expansion<'_>, scorer: Option<&CtcPrefixScorer>, w: Weights) -> Vec<Candidate> {
    let local: Vec<f64> = job
        .att
        .iter()
        .enumerate()
        .map(|(k, &a)| f64::from(a) + job.lm.map_or(0.0, |lm| weighted(w.lm, lm[k])))
        .collect();

    let (Some(scorer), Some(prev)) = (scorer, job.ctc) else {
        return top_k(&local, w.beam)
            .into_iter()
            .map(|token| Candidate {
                token,
                delta: local[token],
                ctc: None,
            })
            .collect();
    };

    // Attention pre-pruning bounds the CTC work; with full CTC weight every token is scored.
    let ids = if w.ctc_beam >= local.len() {
        (0..local.len()).collect()
    } else {
        top_k(&local, w.ctc_beam)
    };
    let ctc_scores = scorer.score(job.tokens, &ids, &prev.state);

    let mut joint: Vec<(usize, f64)> = ids
        .iter()
        .enumerate()
        .map(|(j, &c)| {
            let mut s = weighted(1.0 - w.ctc, job.att[c])
                + w.ctc * (ctc_scores.score(j) - prev.score_prev);
            if let Some(lm) = job.lm {
                s += weighted(w.lm, lm[c]);
            }
            (j, s)
        })
        .filter(|(_, s)| s.is_finite())
        .collect();
    joint.sort_by(|a, b| b.1.total_cmp(&a.1));
    joint.truncate(w.beam);

    joint
        .into_iter()
        .map(|(j, delta)| Candidate {
            token: ids[j],
            delta,
            ctc: Some(CtcExtra {
                state: ctc_scores.state(j),
                score_prev: ctc_scores.score(j),
            }),
        })
        .collect()
}

fn render(list: Option<&TokenList>, tokens: &[TokenId], special: &SpecialTokens) -> String {
    match list {
        Some(list) => list.render(tokens, special),
        None => format!("{:?}", &tokens[1..]),
    }
}

pub(crate) fn beam_search<D, L>(
    ctx: &SearchContext<'_, D, L>,
    limits: SearchLimits,
) -> Result<Vec<Hypothesis<L::State>>>
where
    D: AttentionDecoder,
    L: LanguageModel,
{
    let config = ctx.config;
    let eos = ctx.tokens.eos;
    let vocab = ctx.decoder.vocab_size();
    let weights = Weights {
        ctc: config.ctc_weight,
        lm: config.lm_weight,
        beam: config.beam_size,
        ctc_beam: config.ctc_beam(vocab),
    };

    let mut init = Hypothesis::initial(ctx.tokens.sos);
    if let Some(scorer) = ctx.ctc {
        init.ctc = Some(CtcExtra {
            state: scorer.initial_state(),
            score_prev: 0.0,
        });
    }
    if let Some(lm) = ctx.lm {
        init.lm = Some(LmExtra {
            state: lm.initial_state(),
        });
    }

    let mut hyps = vec![init];
    let mut ended: Vec<Hypothesis<L::State>> = Vec::new();
    let mut ended_view: Vec<EndedHyp> = Vec::new();

    for i in 0..limits.maxlen {
        log::debug!("position {i}");

        let prefixes: Vec<&[TokenId]> = hyps.iter().map(|h| h.tokens.as_slice()).collect();
        let att = ctx.decoder.batch_log_probs(&prefixes, ctx.memory)?;
        if att.dim() != (hyps.len(), vocab) {
            return Err(DecodeError::VocabMismatch {
                expected: vocab,
                actual: att.ncols(),
            });
        }

        let lm_out: Option<Vec<(L::State, Array1<f32>)>> = match ctx.lm {
            Some(lm) => Some(
                hyps.iter()
                    .map(|h| {
                        let extra = h.lm.as_ref().ok_or_else(|| {
                            DecodeError::Collaborator("hypothesis is missing LM state".into())
                        })?;
                        let (state, scores) = lm.predict(&extra.state, h.last_token())?;
                        if scores.len() != vocab {
                            return Err(DecodeError::VocabMismatch {
                                expected: vocab,
                                actual: scores.len(),
                            });
                        }
                        Ok((state, scores))
                    })
                    .collect::<Result<_>>()?,
            ),
            None => None,
        };

        let jobs: Vec<Expansion<'_>> = hyps
            .iter()
            .enumerate()
            .map(|(idx, h)| Expansion {
                tokens: &h.tokens,
                ctc: h.ctc.as_ref(),
                att: att.row(idx),
                lm: lm_out.as_ref().map(|out| out[idx].1.view()),
            })
            .collect();
        let scorer = ctx.ctc;
        let expanded: Vec<Vec<Candidate>> = match ctx.pool {
            Some(pool) => pool.install(|| {
                jobs.par_iter()
                    .map(|job| expand(job, scorer, weights))
                    .collect()
            }),
            None => jobs.iter().map(|job| expand(job, scorer, weights)).collect(),
        };

        let mut next = Vec::with_capacity(hyps.len() * config.beam_size);
        for (idx, (hyp, candidates)) in hyps.iter().zip(expanded).enumerate() {
            for cand in candidates {
                let mut tokens = Vec::with_capacity(hyp.tokens.len() + 1);
                tokens.extend_from_slice(&hyp.tokens);
                tokens.push(cand.token);
                next.push(Hypothesis {
                    score: hyp.score + cand.delta,
                    tokens,
                    ctc: cand.ctc,
                    lm: lm_out.as_ref().map(|out| LmExtra {
                        state: out[idx].0.clone(),
                    }),
                });
            }
        }
        sort_by_score_desc(&mut next);
        next.truncate(config.beam_size);
        hyps = next;

        log::debug!("number of pruned hypotheses: {}", hyps.len());
        if let Some(best) = hyps.first() {
            log::debug!(
                "best hypo: {} score: {}",
                render(ctx.token_list, &best.tokens, &ctx.tokens),
                best.score
            );
        }

        // Guarantees at least one ended hypothesis once the length limit is hit.
        if i == limits.maxlen - 1 {
            log::info!("adding <eos> in the last position in the loop");
            for hyp in &mut hyps {
                if !hyp.ends_with(eos) {
                    hyp.tokens.push(eos);
                }
            }
        }

        let mut remained = Vec::with_capacity(hyps.len());
        for mut hyp in hyps {
            if !hyp.ends_with(eos) {
                remained.push(hyp);
                continue;
            }
            if hyp.tokens.len() <= limits.minlen {
                log::debug!(
                    "dropping ended hypothesis of length {} (min {})",
                    hyp.tokens.len(),
                    limits.minlen
                );
                continue;
            }
            hyp.score += (i + 1) as f64 * config.penalty;
            if let (Some(lm), Some(extra)) = (ctx.lm, hyp.lm.as_ref()) {
                hyp.score += weights.lm * f64::from(lm.final_score(&extra.state));
            }
            if hyp.score.is_finite() {
                ended_view.push(EndedHyp::from(&hyp));
                ended.push(hyp);
            }
        }

        if config.maxlenratio == 0.0 && ctx.end_detector.should_stop(&ended_view, i) {
            log::info!("end detected at {i}");
            break;
        }

        hyps = remained;
        if hyps.is_empty() {
            log::info!("no hypothesis. Finish decoding.");
            break;
        }
        log::debug!("remained hypotheses: {}", hyps.len());
        log::debug!("number of ended hypotheses: {}", ended.len());
    }

    Ok(ended)
}

/// Attention-only argmax decoding; one hypothesis, not subject to `minlen`.
pub(crate) fn greedy_search<D, L>(
    ctx: &SearchContext<'_, D, L>,
    limits: SearchLimits,
) -> Result<Vec<Hypothesis<L::State>>>
where
    D: AttentionDecoder,
    L: LanguageModel,
{
    let eos = ctx.tokens.eos;
    let vocab = ctx.decoder.vocab_size();
    let mut hyp = Hypothesis::initial(ctx.tokens.sos);

    for step in 0..limits.maxlen {
        let scores = ctx.decoder.log_probs(&hyp.tokens, ctx.memory)?;
        if scores.len() != vocab {
            return Err(DecodeError::VocabMismatch {
                expected: vocab,
                actual: scores.len(),
            });
        }
        let Some((best, best_score)) = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, s)| s.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            log::warn!("attention decoder returned no finite scores at step {step}");
            return Ok(Vec::new());
        };

        hyp.score += f64::from(best_score);
        let token = if step == limits.maxlen - 1 { eos } else { best };
        hyp.tokens.push(token);
        if token == eos {
            break;
        }
    }

    log::debug!(
        "greedy hypothesis: {}",
        render(ctx.token_list, &hyp.tokens, &ctx.tokens)
    );
    Ok(vec![hyp])
}
